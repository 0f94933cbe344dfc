//! rollcall-core — Face detection, recognition and reference-set matching.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings,
//! both running via ONNX Runtime for CPU inference.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod recognizer;
pub mod reference;
mod session;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use detector::FaceDetector;
pub use recognizer::FaceRecognizer;
pub use reference::{build_reference_set, load_reference_images, ReferenceError, ReferenceSet};
pub use types::{
    compare_faces, face_distance, BoundingBox, DistanceMatcher, Embedding, MatchResult, Matcher,
    ReferenceEntry,
};

/// Default directory for ONNX model files: `$XDG_DATA_HOME/rollcall/models`.
pub fn default_model_dir() -> std::path::PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/models")
}
