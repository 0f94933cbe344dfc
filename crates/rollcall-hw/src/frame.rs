//! Captured camera frame, held as RGB.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::time::{Duration, Instant};

/// A captured colour frame.
///
/// The camera converts from the device's BGR layout on capture, so every
/// consumer downstream works in RGB.
#[derive(Clone)]
pub struct Frame {
    image: RgbImage,
    pub timestamp: Instant,
    pub sequence: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid RGB length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid scale factor: {0}")]
    InvalidScale(f32),
}

impl Frame {
    /// Wrap an interleaved RGB buffer of `width * height` pixels.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        let actual = data.len();
        let image = RgbImage::from_raw(width, height, data)
            .filter(|_| actual == expected)
            .ok_or(FrameError::InvalidLength { expected, actual })?;
        Ok(Self::from_image(image, sequence))
    }

    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Time since the frame was captured.
    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }

    /// Flip horizontally in place (selfie view).
    pub fn mirror(&mut self) {
        imageops::flip_horizontal_in_place(&mut self.image);
    }

    /// Resize by `scale` (0.5 = half size), keeping capture metadata.
    pub fn resized(&self, scale: f32) -> Result<Frame, FrameError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(FrameError::InvalidScale(scale));
        }
        if self.width() == 0 || self.height() == 0 {
            return Ok(self.clone());
        }

        let new_w = ((self.width() as f32 * scale).round() as u32).max(1);
        let new_h = ((self.height() as f32 * scale).round() as u32).max(1);
        Ok(Frame {
            image: imageops::resize(&self.image, new_w, new_h, FilterType::Triangle),
            timestamp: self.timestamp,
            sequence: self.sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame(width: u32, height: u32, data: Vec<u8>) -> Frame {
        Frame::from_rgb(data, width, height, 0).unwrap()
    }

    #[test]
    fn test_from_rgb_rejects_short_buffer() {
        let err = Frame::from_rgb(vec![0; 5], 2, 1, 0).err().unwrap();
        assert!(matches!(err, FrameError::InvalidLength { expected: 6, actual: 5 }));
    }

    #[test]
    fn test_from_rgb_rejects_long_buffer() {
        let err = Frame::from_rgb(vec![0; 7], 2, 1, 0).err().unwrap();
        assert!(matches!(err, FrameError::InvalidLength { expected: 6, actual: 7 }));
    }

    #[test]
    fn test_mirror_swaps_pixels_not_channels() {
        let mut f = frame(3, 1, (1..=9).collect());
        f.mirror();
        assert_eq!(f.image().as_raw(), &vec![7, 8, 9, 4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn test_mirror_twice_is_identity() {
        let data: Vec<u8> = (0..4 * 3 * 3).map(|i| i as u8).collect();
        let mut f = frame(4, 3, data.clone());
        f.mirror();
        f.mirror();
        assert_eq!(f.into_image().into_raw(), data);
    }

    #[test]
    fn test_resized_dimensions_and_metadata() {
        let f = Frame::from_rgb(vec![0; 640 * 480 * 3], 640, 480, 42).unwrap();
        let small = f.resized(0.25).unwrap();
        assert_eq!((small.width(), small.height()), (160, 120));
        assert_eq!(small.sequence, 42);
        assert_eq!(small.timestamp, f.timestamp);
    }

    #[test]
    fn test_resized_uniform_stays_uniform() {
        let image = RgbImage::from_pixel(100, 80, Rgb([10, 128, 250]));
        let small = Frame::from_image(image, 0).resized(0.5).unwrap();
        assert!(small.image().pixels().all(|p| *p == Rgb([10, 128, 250])));
    }

    #[test]
    fn test_resized_rejects_bad_scale() {
        let f = frame(2, 2, vec![0; 12]);
        assert!(matches!(f.resized(0.0), Err(FrameError::InvalidScale(_))));
        assert!(matches!(f.resized(f32::NAN), Err(FrameError::InvalidScale(_))));
    }
}
