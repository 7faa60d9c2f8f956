use std::path::PathBuf;

/// Errors raised while loading or validating a device calibration.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("failed to read calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed calibration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("calibration {serial:?} has invalid {field} ({value})")]
    InvalidField {
        serial: String,
        field: &'static str,
        value: f32,
    },
}
