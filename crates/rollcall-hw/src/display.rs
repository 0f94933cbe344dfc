//! On-screen preview: a named OpenCV window, annotation drawing, key polling.

use crate::frame::Frame;
use opencv::core::{Mat, Point, Rect, Scalar};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use thiserror::Error;

/// Key code reported by `wait_key` for Escape.
pub const ESC_KEY: i32 = 27;

const LABEL_BAR_HEIGHT: i32 = 35;
const LABEL_INSET: i32 = 6;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// How an annotation is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationStyle {
    /// Recognized person: green box with a filled name bar along the bottom.
    Known,
    /// Face without an accepted match: red box with a filled name bar.
    Unknown,
    /// Detection-only mode: thin box with the label above it.
    Detection,
}

impl AnnotationStyle {
    /// Box colour in BGR.
    fn color(self) -> Scalar {
        match self {
            AnnotationStyle::Known => Scalar::new(0.0, 200.0, 0.0, 0.0),
            AnnotationStyle::Unknown => Scalar::new(0.0, 0.0, 200.0, 0.0),
            AnnotationStyle::Detection => Scalar::new(50.0, 200.0, 50.0, 0.0),
        }
    }
}

/// A labelled rectangle in full-frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub label: String,
    pub style: AnnotationStyle,
}

/// Where the pieces of an annotation go.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    frame: Rect,
    label_bar: Option<Rect>,
    text_origin: Point,
}

impl Annotation {
    fn layout(&self) -> Layout {
        let frame = Rect::new(
            self.left,
            self.top,
            (self.right - self.left).max(0),
            (self.bottom - self.top).max(0),
        );
        match self.style {
            AnnotationStyle::Known | AnnotationStyle::Unknown => Layout {
                frame,
                label_bar: Some(Rect::new(
                    self.left,
                    self.bottom - LABEL_BAR_HEIGHT,
                    frame.width,
                    LABEL_BAR_HEIGHT,
                )),
                text_origin: Point::new(self.left + LABEL_INSET, self.bottom - LABEL_INSET),
            },
            AnnotationStyle::Detection => Layout {
                frame,
                label_bar: None,
                text_origin: Point::new(self.left, self.top - 10),
            },
        }
    }

    /// Draw onto a BGR image.
    pub fn draw(&self, image: &mut Mat) -> Result<(), DisplayError> {
        let layout = self.layout();
        let color = self.style.color();

        imgproc::rectangle(image, layout.frame, color, 2, imgproc::LINE_8, 0)?;

        let text_color = match layout.label_bar {
            Some(bar) => {
                imgproc::rectangle(image, bar, color, imgproc::FILLED, imgproc::LINE_8, 0)?;
                Scalar::new(255.0, 255.0, 255.0, 0.0)
            }
            None => Scalar::new(200.0, 200.0, 200.0, 0.0),
        };

        imgproc::put_text(
            image,
            &self.label,
            layout.text_origin,
            imgproc::FONT_HERSHEY_DUPLEX,
            0.8,
            text_color,
            if layout.label_bar.is_some() { 1 } else { 2 },
            imgproc::LINE_8,
            false,
        )?;
        Ok(())
    }
}

/// A named preview window; destroyed when dropped.
pub struct Window {
    name: String,
}

impl Window {
    pub fn open(name: &str) -> Result<Self, DisplayError> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        tracing::debug!(window = name, "opened display window");
        Ok(Self {
            name: name.to_string(),
        })
    }

    /// Render `frame` with `annotations` drawn over it.
    pub fn show(&self, frame: &Frame, annotations: &[Annotation]) -> Result<(), DisplayError> {
        let flat = Mat::from_slice(frame.image().as_raw())?;
        let rgb = flat.reshape(3, frame.height() as i32)?.try_clone()?;
        let mut image = Mat::default();
        imgproc::cvt_color(&rgb, &mut image, imgproc::COLOR_RGB2BGR, 0)?;

        for annotation in annotations {
            annotation.draw(&mut image)?;
        }

        highgui::imshow(&self.name, &image)?;
        Ok(())
    }

    /// Pump the window event loop for `delay_ms` and report whether Escape
    /// was pressed.
    pub fn escape_pressed(&self, delay_ms: i32) -> Result<bool, DisplayError> {
        let key = highgui::wait_key(delay_ms)?;
        Ok(key >= 0 && key & 0xFF == ESC_KEY)
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.name) {
            tracing::warn!(window = %self.name, error = %e, "failed to close window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(style: AnnotationStyle) -> Annotation {
        Annotation {
            left: 100,
            top: 50,
            right: 220,
            bottom: 190,
            label: "alice".into(),
            style,
        }
    }

    #[test]
    fn test_recognition_layout_puts_label_bar_inside_bottom() {
        let layout = annotation(AnnotationStyle::Known).layout();
        assert_eq!(layout.frame, Rect::new(100, 50, 120, 140));
        assert_eq!(layout.label_bar, Some(Rect::new(100, 155, 120, 35)));
        assert_eq!(layout.text_origin, Point::new(106, 184));
    }

    #[test]
    fn test_detection_layout_puts_label_above_box() {
        let layout = annotation(AnnotationStyle::Detection).layout();
        assert_eq!(layout.label_bar, None);
        assert_eq!(layout.text_origin, Point::new(100, 40));
    }

    #[test]
    fn test_inverted_box_clamps_to_empty() {
        let mut a = annotation(AnnotationStyle::Unknown);
        a.right = 90;
        assert_eq!(a.layout().frame.width, 0);
    }
}
