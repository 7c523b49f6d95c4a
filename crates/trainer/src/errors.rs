use exo_dataset::PipelineError;
use thiserror::Error;

/// Errors returned by the deterministic trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// Training input does not satisfy a precondition (too few rows,
    /// non-binary labels, mismatched shapes, bad hyperparameters).
    #[error("invalid training input: {0}")]
    InvalidInput(String),

    /// Model artifact could not be written, read or validated.
    #[error("model artifact error: {0}")]
    Artifact(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrainerError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn artifact<S: Into<String>>(message: S) -> Self {
        Self::Artifact(message.into())
    }
}

impl From<std::io::Error> for TrainerError {
    fn from(err: std::io::Error) -> Self {
        TrainerError::Artifact(err.to_string())
    }
}

impl From<TrainerError> for PipelineError {
    fn from(err: TrainerError) -> Self {
        match err {
            TrainerError::InvalidInput(message) => PipelineError::Validation(message),
            other => PipelineError::Storage(other.to_string()),
        }
    }
}
