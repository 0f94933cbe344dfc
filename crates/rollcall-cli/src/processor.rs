//! Per-frame pipelines: recognition with attendance, and detection only.

use crate::ledger::{AttendanceLedger, LedgerError};
use chrono::{DateTime, Local};
use rollcall_core::{BoundingBox, FaceAnalyzer, Matcher, ReferenceSet};
use rollcall_hw::{Annotation, AnnotationStyle, Frame};

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const DETECTION_LABEL: &str = "Face";

/// Turns one camera frame into the annotations to draw over it.
///
/// Implementations never fail: a frame that cannot be analysed yields no
/// annotations and the capture loop carries on.
pub trait FrameProcessor {
    fn process(&mut self, frame: &Frame) -> Vec<Annotation>;
}

fn annotation(face: &BoundingBox, scale: f32, label: String, style: AnnotationStyle) -> Annotation {
    let (left, top, right, bottom) = face.unscaled(scale).corners();
    Annotation {
        left,
        top,
        right,
        bottom,
        label,
        style,
    }
}

/// Downscale and convert a frame for analysis; `None` if the frame is unusable.
fn analysis_image(frame: &Frame, scale: f32) -> Option<image::RgbImage> {
    match frame.resized(scale) {
        Ok(small) => Some(small.into_image()),
        Err(e) => {
            tracing::warn!(seq = frame.sequence, error = %e, "cannot downscale frame");
            None
        }
    }
}

/// Recognizes faces against the reference set and records attendance.
pub struct RecognitionProcessor<A, M> {
    analyzer: A,
    references: ReferenceSet,
    ledger: AttendanceLedger,
    matcher: M,
    scale: f32,
}

impl<A: FaceAnalyzer, M: Matcher> RecognitionProcessor<A, M> {
    pub fn new(analyzer: A, references: ReferenceSet, ledger: AttendanceLedger, matcher: M, scale: f32) -> Self {
        Self {
            analyzer,
            references,
            ledger,
            matcher,
            scale,
        }
    }

    /// Process `frame` as if observed at `now`.
    pub fn process_at(&mut self, frame: &Frame, now: DateTime<Local>) -> Vec<Annotation> {
        self.annotate(frame, |ledger, name| ledger.record_at(name, now))
    }

    fn annotate<F>(&mut self, frame: &Frame, record: F) -> Vec<Annotation>
    where
        F: Fn(&mut AttendanceLedger, &str) -> Result<bool, LedgerError>,
    {
        let Some(rgb) = analysis_image(frame, self.scale) else {
            return Vec::new();
        };

        let locations = match self.analyzer.face_locations(&rgb) {
            Ok(locations) => locations,
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "face detection failed; frame left unannotated");
                return Vec::new();
            }
        };
        if locations.is_empty() {
            tracing::debug!(seq = frame.sequence, "no face detected");
            return Vec::new();
        }

        let encodings = match self.analyzer.face_encodings(&rgb, Some(&locations)) {
            Ok(encodings) => encodings,
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "face encoding failed; frame left unannotated");
                return Vec::new();
            }
        };

        let mut annotations = Vec::with_capacity(locations.len());
        for (face, encoding) in locations.iter().zip(encodings.iter()) {
            let result = self.matcher.compare(encoding, self.references.entries());
            tracing::trace!(distance = ?result.distance, index = ?result.index, matched = result.matched, "match result");

            let (label, style) = match result.label {
                Some(name) => {
                    if let Err(e) = record(&mut self.ledger, &name) {
                        tracing::warn!(name = %name, error = %e, "failed to write attendance row");
                    }
                    (name, AnnotationStyle::Known)
                }
                None => (UNKNOWN_LABEL.to_string(), AnnotationStyle::Unknown),
            };
            annotations.push(annotation(face, self.scale, label, style));
        }
        annotations
    }
}

impl<A: FaceAnalyzer, M: Matcher> FrameProcessor for RecognitionProcessor<A, M> {
    fn process(&mut self, frame: &Frame) -> Vec<Annotation> {
        self.annotate(frame, |ledger, name| ledger.record(name))
    }
}

/// Draws a box around every detected face; no recognition, no ledger.
pub struct DetectionProcessor<A> {
    analyzer: A,
    scale: f32,
}

impl<A: FaceAnalyzer> DetectionProcessor<A> {
    pub fn new(analyzer: A, scale: f32) -> Self {
        Self { analyzer, scale }
    }
}

impl<A: FaceAnalyzer> FrameProcessor for DetectionProcessor<A> {
    fn process(&mut self, frame: &Frame) -> Vec<Annotation> {
        let Some(rgb) = analysis_image(frame, self.scale) else {
            return Vec::new();
        };

        match self.analyzer.face_locations(&rgb) {
            Ok(faces) if faces.is_empty() => {
                tracing::debug!(seq = frame.sequence, "no face detected");
                Vec::new()
            }
            Ok(faces) => faces
                .iter()
                .map(|face| annotation(face, self.scale, DETECTION_LABEL.to_string(), AnnotationStyle::Detection))
                .collect(),
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "face detection failed; frame left unannotated");
                Vec::new()
            }
        }
    }
}
