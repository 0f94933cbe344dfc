use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Runtime configuration.
///
/// Layered as: built-in defaults, then an optional TOML file, then
/// `ROLLCALL_*` environment variables. Command-line flags are applied on top
/// by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Camera index passed to the capture backend (default: 0).
    pub camera_index: i32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Directory of reference face images, one person per file.
    pub reference_dir: PathBuf,
    /// Attendance CSV file.
    pub ledger_path: PathBuf,
    /// Factor frames are downscaled by before detection, in (0, 1].
    pub scale: f32,
    /// Closest-reference distance must be strictly below this to be accepted.
    pub face_score: f32,
    /// Distance at or below which a reference counts as a match.
    pub match_tolerance: f32,
    /// Minimum SCRFD confidence for a detection.
    pub detection_threshold: f32,
    /// Minimum time between two ledger rows for the same person.
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_index: 0,
            model_dir: rollcall_core::default_model_dir(),
            reference_dir: PathBuf::from("images"),
            ledger_path: PathBuf::from("attendance.csv"),
            scale: 0.5,
            face_score: 1.0,
            match_tolerance: 1.1,
            detection_threshold: rollcall_core::detector::SCRFD_DEFAULT_CONFIDENCE,
            debounce_ms: 1000,
        }
    }
}

impl Config {
    /// Load defaults, the optional TOML file, then process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `ROLLCALL_*` overrides from `lookup`. Unparseable values are
    /// ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env_parse(&lookup, "ROLLCALL_CAMERA_INDEX") {
            self.camera_index = v;
        }
        if let Some(v) = lookup("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_REFERENCE_DIR") {
            self.reference_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_LEDGER_PATH") {
            self.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = env_parse(&lookup, "ROLLCALL_SCALE") {
            self.scale = v;
        }
        if let Some(v) = env_parse(&lookup, "ROLLCALL_FACE_SCORE") {
            self.face_score = v;
        }
        if let Some(v) = env_parse(&lookup, "ROLLCALL_MATCH_TOLERANCE") {
            self.match_tolerance = v;
        }
        if let Some(v) = env_parse(&lookup, "ROLLCALL_DETECTION_THRESHOLD") {
            self.detection_threshold = v;
        }
        if let Some(v) = env_parse(&lookup, "ROLLCALL_DEBOUNCE_MS") {
            self.debounce_ms = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "scale must be in (0, 1], got {}",
                self.scale
            )));
        }
        if !(self.face_score > 0.0) || !(self.match_tolerance > 0.0) {
            return Err(ConfigError::Invalid(
                "face_score and match_tolerance must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.detection_threshold) {
            return Err(ConfigError::Invalid(format!(
                "detection_threshold must be in [0, 1), got {}",
                self.detection_threshold
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_parse<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.debounce(), Duration::from_secs(1));
        assert_eq!(config.ledger_path, PathBuf::from("attendance.csv"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(lookup(&[
            ("ROLLCALL_CAMERA_INDEX", "2"),
            ("ROLLCALL_SCALE", "0.25"),
            ("ROLLCALL_LEDGER_PATH", "/tmp/att.csv"),
            ("ROLLCALL_DEBOUNCE_MS", "250"),
        ]));
        assert_eq!(config.camera_index, 2);
        assert_eq!(config.scale, 0.25);
        assert_eq!(config.ledger_path, PathBuf::from("/tmp/att.csv"));
        assert_eq!(config.debounce(), Duration::from_millis(250));
    }

    #[test]
    fn test_unparseable_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(lookup(&[("ROLLCALL_FACE_SCORE", "close")]));
        assert_eq!(config.face_score, Config::default().face_score);
    }

    #[test]
    fn test_toml_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "camera_index = 1\nface_score = 0.9\n").unwrap();

        let config: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.camera_index, 1);
        assert_eq!(config.face_score, 0.9);
        assert_eq!(config.scale, 0.5);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        assert!(toml::from_str::<Config>("cammera_index = 1").is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::load(Some(Path::new("/nonexistent/rollcall.toml"))).err().unwrap();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        for scale in [0.0, -0.5, 1.5, f32::NAN] {
            let config = Config { scale, ..Config::default() };
            assert!(config.validate().is_err(), "scale {scale} accepted");
        }
    }
}
