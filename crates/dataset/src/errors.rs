//! Error taxonomy shared by every stage of the ingest-and-train pipeline.

use thiserror::Error;

/// Errors surfaced by the dataset store, feature derivation, training and
/// prediction.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Uploaded or stored content could not be parsed as a table.
    #[error("format error: {0}")]
    Format(String),

    /// Content parsed but does not satisfy a requirement (missing column,
    /// too few rows, non-binary labels).
    #[error("validation error: {0}")]
    Validation(String),

    /// Backing file I/O failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Prediction was requested before any model was trained or loaded.
    #[error("model not available; train a model first")]
    ModelUnavailable,
}

impl PipelineError {
    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::Format(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
