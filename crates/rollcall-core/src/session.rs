//! ONNX Runtime session setup shared by the detector and the recognizer.

use ort::session::Session;
use std::path::Path;

const INTRA_THREADS: usize = 2;

/// Build a CPU session for the model at `model_path`.
///
/// Returns `Ok(None)` when the file is missing so each caller can report it
/// with its own error type.
pub(crate) fn open(model_path: &str, model: &'static str) -> Result<Option<Session>, ort::Error> {
    if !Path::new(model_path).is_file() {
        return Ok(None);
    }

    let session = Session::builder()?
        .with_intra_threads(INTRA_THREADS)?
        .commit_from_file(model_path)?;

    tracing::info!(
        model,
        path = model_path,
        inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
        outputs = ?output_names(&session),
        "loaded ONNX model"
    );
    Ok(Some(session))
}

pub(crate) fn output_names(session: &Session) -> Vec<String> {
    session.outputs().iter().map(|o| o.name().to_string()).collect()
}
