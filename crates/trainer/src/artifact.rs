//! Persisted model artifact: the fitted ensemble together with the ordered
//! feature columns it expects, its hyperparameters and training metadata.
//!
//! Artifacts are written as canonical JSON. `metadata.model_hash` is the
//! BLAKE3 hash of the canonical JSON of the ensemble alone and is checked on
//! load.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use exo_dataset::{feature_matrix, Dataset};
use serde::{Deserialize, Serialize};

use crate::errors::TrainerError;
use crate::model::GbdtModel;
use crate::serialization::{canonical_json_string, write_atomic};
use crate::trainer::GbdtConfig;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub created_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_val: usize,
    /// Holdout accuracy; absent for models refit by tuning.
    pub validation_accuracy: Option<f64>,
    /// Mean cross-validation accuracy; present only for tuned models.
    pub cv_score: Option<f64>,
    pub model_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_columns: Vec<String>,
    pub params: GbdtConfig,
    pub model: GbdtModel,
    pub metadata: ModelMetadata,
}

/// Hex BLAKE3 digest of the model's canonical JSON.
pub fn model_hash(model: &GbdtModel) -> Result<String, TrainerError> {
    let canonical = canonical_json_string(model)?;
    Ok(hex::encode(blake3::hash(canonical.as_bytes()).as_bytes()))
}

impl ModelArtifact {
    pub fn new(
        feature_columns: Vec<String>,
        params: GbdtConfig,
        model: GbdtModel,
        n_train: usize,
        n_val: usize,
    ) -> Result<Self, TrainerError> {
        let model_hash = model_hash(&model)?;
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_columns,
            params,
            model,
            metadata: ModelMetadata {
                created_at: Utc::now(),
                n_train,
                n_val,
                validation_accuracy: None,
                cv_score: None,
                model_hash,
            },
        })
    }

    pub fn with_validation_accuracy(mut self, accuracy: f64) -> Self {
        self.metadata.validation_accuracy = Some(accuracy);
        self
    }

    pub fn with_cv_score(mut self, score: f64) -> Self {
        self.metadata.cv_score = Some(score);
        self
    }

    pub fn to_canonical_json(&self) -> Result<String, TrainerError> {
        Ok(canonical_json_string(self)?)
    }

    /// Write the artifact to `path`, replacing any previous one atomically.
    pub fn save(&self, path: &Path) -> Result<(), TrainerError> {
        let json = self.to_canonical_json()?;
        write_atomic(path, json.as_bytes()).map_err(|err| {
            TrainerError::artifact(format!("failed to write {}: {err}", path.display()))
        })?;
        tracing::info!(
            path = %path.display(),
            hash = %self.metadata.model_hash,
            "saved model artifact"
        );
        Ok(())
    }

    /// Read and validate an artifact.
    pub fn load(path: &Path) -> Result<Self, TrainerError> {
        let text = fs::read_to_string(path).map_err(|err| {
            TrainerError::artifact(format!("failed to read {}: {err}", path.display()))
        })?;
        let artifact: Self = serde_json::from_str(&text)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(TrainerError::artifact(format!(
                "unsupported artifact format version {}",
                self.format_version
            )));
        }
        if self.model.feature_count != self.feature_columns.len() {
            return Err(TrainerError::artifact(format!(
                "model expects {} features but artifact lists {}",
                self.model.feature_count,
                self.feature_columns.len()
            )));
        }
        self.model.validate().map_err(TrainerError::Artifact)?;

        let hash = model_hash(&self.model)?;
        if hash != self.metadata.model_hash {
            return Err(TrainerError::artifact("model hash mismatch"));
        }
        Ok(())
    }

    /// Feature rows for `dataset`, projected onto this artifact's columns.
    /// Columns the dataset lacks read as 0.0.
    pub fn features_for(&self, dataset: &Dataset) -> Vec<Vec<f64>> {
        feature_matrix(dataset, &self.feature_columns)
    }

    /// 0/1 labels and positive-class probabilities for every row.
    pub fn predict(&self, dataset: &Dataset) -> (Vec<u8>, Vec<f64>) {
        self.features_for(dataset)
            .iter()
            .map(|row| {
                let probability = self.model.predict_proba(row);
                (u8::from(probability >= 0.5), probability)
            })
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Tree};
    use exo_dataset::read_csv_bytes;

    fn artifact() -> Result<ModelArtifact, TrainerError> {
        let mut root = Node::split(0, 2.0);
        root.left = 1;
        root.right = 2;
        let model = GbdtModel {
            base_score: 0.1,
            feature_count: 2,
            trees: vec![Tree {
                nodes: vec![root, Node::leaf(-0.7), Node::leaf(0.7)],
            }],
        };
        ModelArtifact::new(
            vec!["planet_radius".into(), "radius_ratio".into()],
            GbdtConfig::default(),
            model,
            8,
            2,
        )
    }

    #[test]
    fn save_load_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.json");
        let original = artifact()?.with_validation_accuracy(0.5);

        original.save(&path)?;
        let loaded = ModelArtifact::load(&path)?;

        assert_eq!(loaded, original);
        assert_eq!(loaded.to_canonical_json()?, original.to_canonical_json()?);
        Ok(())
    }

    #[test]
    fn hash_is_stable_and_content_sensitive() -> anyhow::Result<()> {
        let a = artifact()?;
        let b = artifact()?;
        assert_eq!(a.metadata.model_hash, b.metadata.model_hash);
        assert_eq!(a.metadata.model_hash.len(), 64);

        let mut changed = a.model.clone();
        changed.base_score = 0.2;
        assert_ne!(model_hash(&changed)?, a.metadata.model_hash);
        Ok(())
    }

    #[test]
    fn load_rejects_tampered_model() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.json");
        let mut tampered = artifact()?;
        tampered.model.base_score = 3.0;
        tampered.save(&path)?;

        assert!(matches!(
            ModelArtifact::load(&path),
            Err(TrainerError::Artifact(_))
        ));
        Ok(())
    }

    #[test]
    fn load_rejects_garbage() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.json");
        std::fs::write(&path, "not json")?;
        assert!(ModelArtifact::load(&path).is_err());
        assert!(ModelArtifact::load(&dir.path().join("absent.json")).is_err());
        Ok(())
    }

    #[test]
    fn predict_projects_by_column_name() -> anyhow::Result<()> {
        let artifact = artifact()?;
        // Column order differs from the artifact; radius_ratio is absent.
        let dataset = read_csv_bytes(b"target,planet_radius\n,1\n,3\n")?;

        let (labels, probabilities) = artifact.predict(&dataset);
        assert_eq!(labels, vec![0, 1]);
        assert_eq!(probabilities.len(), 2);
        assert!(probabilities[0] < 0.5 && probabilities[1] > 0.5);
        Ok(())
    }
}
