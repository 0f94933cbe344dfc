//! Face analysis collaborator: locate faces and embed them.
//!
//! The trait is the seam between the attendance pipeline and the models, so
//! the pipeline can run against a fake in tests.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("analyzer was loaded without a recognition model")]
    RecognizerUnavailable,
}

pub trait FaceAnalyzer {
    /// Bounding boxes of every face in `image`, highest confidence first.
    fn face_locations(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// One embedding per face. When `locations` is `None` the faces are
    /// detected first.
    fn face_encodings(
        &mut self,
        image: &RgbImage,
        locations: Option<&[BoundingBox]>,
    ) -> Result<Vec<Embedding>, AnalyzerError>;
}

/// SCRFD + ArcFace analyzer running on ONNX Runtime.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: Option<FaceRecognizer>,
}

impl OnnxAnalyzer {
    /// Load both models.
    pub fn load(
        scrfd_path: &str,
        arcface_path: &str,
        detection_threshold: f32,
    ) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(scrfd_path, detection_threshold)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self {
            detector,
            recognizer: Some(recognizer),
        })
    }

    /// Load only the detection model; `face_encodings` will fail.
    pub fn detector_only(scrfd_path: &str, detection_threshold: f32) -> Result<Self, AnalyzerError> {
        Ok(Self {
            detector: FaceDetector::load(scrfd_path, detection_threshold)?,
            recognizer: None,
        })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn face_locations(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector.detect(image)?)
    }

    fn face_encodings(
        &mut self,
        image: &RgbImage,
        locations: Option<&[BoundingBox]>,
    ) -> Result<Vec<Embedding>, AnalyzerError> {
        let detected;
        let faces = match locations {
            Some(faces) => faces,
            None => {
                detected = self.detector.detect(image)?;
                &detected[..]
            }
        };

        let recognizer = self
            .recognizer
            .as_mut()
            .ok_or(AnalyzerError::RecognizerUnavailable)?;

        faces
            .iter()
            .map(|face| recognizer.extract(image, face).map_err(AnalyzerError::from))
            .collect()
    }
}
