//! rollcall-hw — Camera capture and on-screen preview.
//!
//! Wraps OpenCV's `VideoCapture` and `highgui` behind small owned handles,
//! and provides the BGR frame type the pipeline works on.

pub mod camera;
pub mod display;
pub mod frame;

pub use camera::{Camera, CameraError};
pub use display::{Annotation, AnnotationStyle, DisplayError, Window};
pub use frame::{Frame, FrameError};
