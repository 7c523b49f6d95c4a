//! In-memory model cache and batch scoring.

use std::path::Path;
use std::sync::Arc;

use exo_dataset::{derive_features, Dataset, PipelineError};
use exo_trainer::ModelArtifact;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub n_rows: usize,
    /// Label of the first row; `None` when the dataset is empty.
    pub sample_prediction: Option<u8>,
    pub predictions: Vec<u8>,
    pub probabilities: Vec<f64>,
}

/// Holds the active model. Replaced wholesale after each successful fit.
#[derive(Default)]
pub struct Predictor {
    cache: RwLock<Option<Arc<ModelArtifact>>>,
}

impl Predictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the artifact at `path` if one exists. A missing or invalid file
    /// leaves the cache empty.
    pub fn load_from_disk(&self, path: &Path) -> bool {
        if !path.exists() {
            info!(path = %path.display(), "no persisted model found");
            return false;
        }
        match ModelArtifact::load(path) {
            Ok(artifact) => {
                info!(
                    path = %path.display(),
                    hash = %artifact.metadata.model_hash,
                    features = artifact.feature_columns.len(),
                    "loaded persisted model"
                );
                self.install(artifact);
                true
            }
            Err(err) => {
                warn!(path = %path.display(), "ignoring unreadable model artifact: {err}");
                false
            }
        }
    }

    pub fn install(&self, artifact: ModelArtifact) {
        *self.cache.write() = Some(Arc::new(artifact));
    }

    pub fn current(&self) -> Option<Arc<ModelArtifact>> {
        self.cache.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.read().is_some()
    }

    /// Score every row of `dataset` with the cached model.
    pub fn predict_dataset(&self, dataset: &Dataset) -> Result<PredictionResult, PipelineError> {
        let artifact = self.current().ok_or(PipelineError::ModelUnavailable)?;

        let (predictions, probabilities) = artifact.predict(&derive_features(dataset));
        Ok(PredictionResult {
            n_rows: predictions.len(),
            sample_prediction: predictions.first().copied(),
            predictions,
            probabilities,
        })
    }
}
