use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Map a box detected in a resized image back into the source image.
    ///
    /// `scale` is the factor the source was resized by (0.5 = half size), so
    /// every coordinate is divided by it.
    pub fn unscaled(&self, scale: f32) -> BoundingBox {
        let inv = 1.0 / scale;
        BoundingBox {
            x: self.x * inv,
            y: self.y * inv,
            width: self.width * inv,
            height: self.height * inv,
            confidence: self.confidence,
            landmarks: self
                .landmarks
                .map(|lms| lms.map(|(lx, ly)| (lx * inv, ly * inv))),
        }
    }

    /// Integer corners `(left, top, right, bottom)`, truncated like the
    /// pixel grid they are drawn on.
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (
            self.x as i32,
            self.y as i32,
            (self.x + self.width) as i32,
            (self.y + self.height) as i32,
        )
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A known person: label derived from the reference filename plus the
/// embedding of the face found in that image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub label: String,
    pub source: PathBuf,
    pub embedding: Embedding,
}

/// Result of matching a probe embedding against the reference set.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Euclidean distance to the closest reference, if any reference exists.
    pub distance: Option<f32>,
    /// Position of the closest reference in the set.
    pub index: Option<usize>,
    /// Label of the accepted reference (only set when `matched`).
    pub label: Option<String>,
}

impl MatchResult {
    fn unknown(distance: Option<f32>, index: Option<usize>) -> Self {
        Self {
            matched: false,
            distance,
            index,
            label: None,
        }
    }
}

/// Euclidean distance from `probe` to every embedding in `known`, in order.
pub fn face_distance(known: &[Embedding], probe: &Embedding) -> Vec<f32> {
    known.iter().map(|k| k.euclidean_distance(probe)).collect()
}

/// Batch match predicate: `true` where the distance to `probe` is within
/// `tolerance`.
pub fn compare_faces(known: &[Embedding], probe: &Embedding, tolerance: f32) -> Vec<bool> {
    face_distance(known, probe)
        .into_iter()
        .map(|d| d <= tolerance)
        .collect()
}

/// Strategy for comparing a probe embedding against the reference set.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, references: &[ReferenceEntry]) -> MatchResult;
}

/// Closest-reference matcher.
///
/// The closest reference is accepted only when it passes the batch
/// `compare_faces` predicate at `tolerance` AND its distance is strictly
/// below `face_score`.
#[derive(Debug, Clone, Copy)]
pub struct DistanceMatcher {
    pub tolerance: f32,
    pub face_score: f32,
}

impl Matcher for DistanceMatcher {
    fn compare(&self, probe: &Embedding, references: &[ReferenceEntry]) -> MatchResult {
        let known: Vec<Embedding> = references.iter().map(|r| r.embedding.clone()).collect();
        let distances = face_distance(&known, probe);
        let matches = compare_faces(&known, probe, self.tolerance);

        let best = distances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, &d)| (i, d));

        match best {
            Some((idx, dist)) if matches[idx] && dist < self.face_score => MatchResult {
                matched: true,
                distance: Some(dist),
                index: Some(idx),
                label: Some(references[idx].label.clone()),
            },
            Some((idx, dist)) => MatchResult::unknown(Some(dist), Some(idx)),
            None => MatchResult::unknown(None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    fn entry(label: &str, values: Vec<f32>) -> ReferenceEntry {
        ReferenceEntry {
            label: label.into(),
            source: PathBuf::from(format!("{label}.jpg")),
            embedding: emb(values),
        }
    }

    #[test]
    fn test_euclidean_distance() {
        let a = emb(vec![0.0, 0.0]);
        let b = emb(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_face_distance_preserves_order() {
        let known = vec![emb(vec![1.0, 0.0]), emb(vec![0.0, 0.0]), emb(vec![0.0, 2.0])];
        let d = face_distance(&known, &emb(vec![0.0, 0.0]));
        assert_eq!(d, vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_compare_faces_tolerance_inclusive() {
        let known = vec![emb(vec![0.6, 0.0]), emb(vec![0.7, 0.0])];
        let m = compare_faces(&known, &emb(vec![0.0, 0.0]), 0.6);
        assert_eq!(m, vec![true, false]);
    }

    #[test]
    fn test_matcher_picks_closest() {
        let refs = vec![
            entry("bob", vec![0.5, 0.0]),
            entry("alice", vec![0.1, 0.0]),
            entry("carol", vec![0.3, 0.0]),
        ];
        let matcher = DistanceMatcher { tolerance: 0.6, face_score: 0.5 };
        let result = matcher.compare(&emb(vec![0.0, 0.0]), &refs);
        assert!(result.matched);
        assert_eq!(result.index, Some(1));
        assert_eq!(result.label.as_deref(), Some("alice"));
    }

    #[test]
    fn test_matcher_face_score_is_strict() {
        let refs = vec![entry("alice", vec![0.5, 0.0])];
        let matcher = DistanceMatcher { tolerance: 0.6, face_score: 0.5 };
        let result = matcher.compare(&emb(vec![0.0, 0.0]), &refs);
        assert!(!result.matched);
        assert_eq!(result.label, None);
        assert_eq!(result.index, Some(0));
    }

    #[test]
    fn test_matcher_requires_predicate_match() {
        // Under face_score but outside the match tolerance.
        let refs = vec![entry("alice", vec![0.4, 0.0])];
        let matcher = DistanceMatcher { tolerance: 0.3, face_score: 0.5 };
        let result = matcher.compare(&emb(vec![0.0, 0.0]), &refs);
        assert!(!result.matched);
    }

    #[test]
    fn test_matcher_empty_references() {
        let matcher = DistanceMatcher { tolerance: 0.6, face_score: 0.5 };
        let result = matcher.compare(&emb(vec![0.0, 0.0]), &[]);
        assert_eq!(result, MatchResult { matched: false, distance: None, index: None, label: None });
    }

    #[test]
    fn test_unscaled_box() {
        let b = BoundingBox {
            x: 10.0, y: 20.0, width: 30.0, height: 40.0,
            confidence: 0.9, landmarks: Some([(1.0, 2.0); 5]),
        };
        let up = b.unscaled(0.5);
        assert_eq!(up.corners(), (20, 40, 80, 120));
        assert_eq!(up.landmarks.unwrap()[0], (2.0, 4.0));
        assert_eq!(up.confidence, 0.9);
    }
}
