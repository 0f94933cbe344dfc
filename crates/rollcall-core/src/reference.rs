//! Reference set: one labelled embedding per known person, built once at
//! startup from a directory of face images.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::ReferenceEntry;
use image::{ImageReader, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("cannot read reference directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot decode reference image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("no face found in reference image for '{label}'; use a photo with one clear face")]
    NoFace { label: String },
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
}

/// A decoded reference image and the label derived from its filename.
pub struct ReferenceImage {
    pub label: String,
    pub source: PathBuf,
    pub image: RgbImage,
}

/// Label for a reference file: the filename with its extension stripped.
pub fn label_for(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decode every entry of `dir` as an RGB image, in directory-listing order.
///
/// Entries are not filtered: anything that does not decode as an image
/// aborts the load.
pub fn load_reference_images(dir: &Path) -> Result<Vec<ReferenceImage>, ReferenceError> {
    let read_dir_err = |source| ReferenceError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_err)? {
        let path = entry.map_err(read_dir_err)?.path();
        tracing::info!(file = %path.display(), "loading reference image");

        let image = decode_by_content(&path)
            .map_err(|source| ReferenceError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();

        images.push(ReferenceImage {
            label: label_for(&path),
            source: path,
            image,
        });
    }

    Ok(images)
}

/// Decode `path`, sniffing the format from its bytes rather than its extension.
fn decode_by_content(path: &Path) -> Result<image::DynamicImage, image::ImageError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Ordered, immutable collection of reference entries.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceSet {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Embed the first face of every reference image, preserving input order.
///
/// An image with no detectable face is an error; images with several faces
/// contribute only the first (highest-confidence) one.
pub fn build_reference_set<A>(
    analyzer: &mut A,
    images: &[ReferenceImage],
) -> Result<ReferenceSet, ReferenceError>
where
    A: FaceAnalyzer + ?Sized,
{
    let mut entries = Vec::with_capacity(images.len());

    for reference in images {
        let mut embeddings = analyzer.face_encodings(&reference.image, None)?;
        if embeddings.len() > 1 {
            tracing::warn!(
                label = %reference.label,
                faces = embeddings.len(),
                "reference image has several faces; using the first"
            );
        }
        if embeddings.is_empty() {
            return Err(ReferenceError::NoFace {
                label: reference.label.clone(),
            });
        }
        let embedding = embeddings.swap_remove(0);

        entries.push(ReferenceEntry {
            label: reference.label.clone(),
            source: reference.source.clone(),
            embedding,
        });
    }

    tracing::info!(count = entries.len(), "reference set ready");
    Ok(ReferenceSet::new(entries))
}
