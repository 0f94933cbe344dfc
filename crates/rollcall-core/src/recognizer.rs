//! ArcFace embeddings (insightface w600k_r50) on ONNX Runtime.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::session;
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

/// Length of every embedding this recognizer produces.
pub const EMBEDDING_DIM: usize = 512;
const MODEL_VERSION: &str = "w600k_r50";
// Symmetric: maps [0, 255] onto [-1, 1].
const PIXEL_CENTER: f32 = 127.5;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("recognition model not found at {0} (expected insightface w600k_r50.onnx)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("detected face carries no landmarks to align on")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        let session = session::open(model_path, "ArcFace")?
            .ok_or_else(|| RecognizerError::ModelNotFound(model_path.to_string()))?;
        Ok(Self { session })
    }

    /// Align `face` out of `image` by its landmarks and embed the crop.
    pub fn extract(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, RecognizerError> {
        let landmarks = face.landmarks.as_ref().ok_or(RecognizerError::NoLandmarks)?;
        let crop = alignment::align_face(image, landmarks);
        self.embed_aligned(&crop)
    }

    /// Embed an already aligned 112×112 crop. The result has unit length.
    pub fn embed_aligned(&mut self, crop: &RgbImage) -> Result<Embedding, RecognizerError> {
        let input = to_tensor(crop);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("reading embedding: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "model returned {} values, want {EMBEDDING_DIM}",
                raw.len()
            )));
        }

        Ok(Embedding {
            values: unit_length(raw),
            model_version: Some(MODEL_VERSION.to_string()),
        })
    }
}

/// Scale `raw` to unit L2 norm; an all-zero vector is returned as is.
fn unit_length(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return raw.to_vec();
    }
    raw.iter().map(|x| x / norm).collect()
}

/// RGB crop to a 1×3×112×112 tensor.
fn to_tensor(crop: &RgbImage) -> Array4<f32> {
    let side = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, px) in crop.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, &v) in px.0.iter().enumerate() {
            tensor[[0, c, y, x]] = (v as f32 - PIXEL_CENTER) / PIXEL_CENTER;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tensor_shape_and_range() {
        let crop = RgbImage::from_pixel(ALIGNED_SIZE, ALIGNED_SIZE, Rgb([255, 0, 128]));
        let tensor = to_tensor(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
        assert!((tensor[[0, 0, 5, 7]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 5, 7]] + 1.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 5, 7]] - 0.5 / 127.5).abs() < 1e-6);
    }

    #[test]
    fn test_unit_length() {
        let v = unit_length(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(unit_length(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_model_file() {
        let err = FaceRecognizer::load("/nonexistent/w600k_r50.onnx").err().unwrap();
        assert!(matches!(err, RecognizerError::ModelNotFound(_)));
    }
}
