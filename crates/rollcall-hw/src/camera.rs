//! Webcam capture via OpenCV `VideoCapture`.

use crate::frame::{Frame, FrameError};
use opencv::core::{Mat, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera {0} could not be opened")]
    DeviceNotFound(i32),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Camera device handle, opened by numeric index.
///
/// The device is released when the handle is dropped.
pub struct Camera {
    capture: VideoCapture,
    pub index: i32,
    pub width: u32,
    pub height: u32,
    sequence: u64,
}

impl Camera {
    /// Open the camera at `index` with whatever resolution the device
    /// defaults to.
    pub fn open(index: i32) -> Result<Self, CameraError> {
        let capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(CameraError::DeviceNotFound(index));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        tracing::info!(index, width, height, "opened camera");

        Ok(Self {
            capture,
            index,
            width,
            height,
            sequence: 0,
        })
    }

    /// Read one frame, converted to RGB.
    ///
    /// Returns `Ok(None)` when the device produced nothing this tick (a
    /// failed grab or an empty image); callers skip that iteration.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        let mut mat = Mat::default();
        if !self.capture.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }
        if mat.typ() != CV_8UC3 {
            return Err(CameraError::CaptureFailed(format!(
                "expected 8-bit BGR frame, got OpenCV type {}",
                mat.typ()
            )));
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        self.sequence += 1;

        let frame = Frame::from_rgb(rgb.data_bytes()?.to_vec(), width, height, self.sequence)?;
        Ok(Some(frame))
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!(index = self.index, error = %e, "failed to release camera");
        } else {
            tracing::debug!(index = self.index, "camera released");
        }
    }
}
