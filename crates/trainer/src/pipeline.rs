//! Training orchestration: derive features, build the labelled matrix, fit
//! (or grid-search), score and persist the model artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use exo_dataset::{derive_features, Dataset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::ModelArtifact;
use crate::errors::TrainerError;
use crate::matrix::LabelledMatrix;
use crate::model::accuracy;
use crate::split::{train_validation_split, SPLIT_SEED, VALIDATION_PERCENT};
use crate::trainer::{GbdtConfig, GbdtTrainer};
use crate::tuning::{grid_search, ParamGrid, TuneRequest, TuningResult};

/// Fewest labelled rows a holdout fit accepts.
pub const MIN_TRAIN_ROWS: usize = 5;
/// Fewest labelled rows a grid search accepts.
pub const MIN_TUNE_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub accuracy: f64,
    pub n_train: usize,
    pub n_val: usize,
    pub features: Vec<String>,
    pub model_path: String,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub result: TrainingResult,
    pub artifact: ModelArtifact,
}

#[derive(Debug, Clone)]
pub struct TuningOutcome {
    pub result: TuningResult,
    pub artifact: ModelArtifact,
}

/// Fits models and owns the model file. Every fit runs under the model lock.
pub struct TrainingPipeline {
    model_path: PathBuf,
    lock: Arc<Mutex<()>>,
    config: GbdtConfig,
    grid: ParamGrid,
}

impl TrainingPipeline {
    pub fn new<P: AsRef<Path>>(model_path: P, config: GbdtConfig) -> Self {
        Self::with_lock(model_path, Arc::new(Mutex::new(())), config)
    }

    pub fn with_lock<P: AsRef<Path>>(
        model_path: P,
        lock: Arc<Mutex<()>>,
        config: GbdtConfig,
    ) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            lock,
            config,
            grid: ParamGrid::default(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Fit on a seeded 80/20 split and report holdout accuracy. With
    /// `persist`, the artifact replaces the model file.
    pub fn train(&self, dataset: &Dataset, persist: bool) -> Result<TrainingOutcome, TrainerError> {
        self.train_then(dataset, persist, |_| {})
    }

    /// Like [`train`](Self::train), but hands the new artifact to `activate`
    /// before the model lock is released, so whoever caches the active model
    /// always ends up with the one on disk.
    pub fn train_then<F>(
        &self,
        dataset: &Dataset,
        persist: bool,
        activate: F,
    ) -> Result<TrainingOutcome, TrainerError>
    where
        F: FnOnce(&ModelArtifact),
    {
        let _guard = self.lock.lock();

        let derived = derive_features(dataset);
        let matrix = LabelledMatrix::from_dataset(&derived, MIN_TRAIN_ROWS)?;

        let split = train_validation_split(matrix.len(), VALIDATION_PERCENT, SPLIT_SEED);
        let (train_x, train_y) = matrix.subset(&split.train);
        let (val_x, val_y) = matrix.subset(&split.validation);

        let model = GbdtTrainer::new(self.config.clone()).fit(&train_x, &train_y)?;
        let val_accuracy = accuracy(&model, &val_x, &val_y);

        let artifact = ModelArtifact::new(
            matrix.feature_columns.clone(),
            self.config.clone(),
            model,
            train_y.len(),
            val_y.len(),
        )?
        .with_validation_accuracy(val_accuracy);

        if persist {
            artifact.save(&self.model_path)?;
        }
        activate(&artifact);

        info!(
            accuracy = val_accuracy,
            n_train = train_y.len(),
            n_val = val_y.len(),
            features = matrix.feature_columns.len(),
            persisted = persist,
            "trained model"
        );

        Ok(TrainingOutcome {
            result: TrainingResult {
                accuracy: val_accuracy,
                n_train: train_y.len(),
                n_val: val_y.len(),
                features: matrix.feature_columns,
                model_path: self.model_path.display().to_string(),
            },
            artifact,
        })
    }

    /// Grid-search the hyperparameters, refit the best candidate on every
    /// labelled row and persist it.
    pub fn tune(
        &self,
        dataset: &Dataset,
        request: &TuneRequest,
    ) -> Result<TuningOutcome, TrainerError> {
        self.tune_then(dataset, request, |_| {})
    }

    /// [`tune`](Self::tune) with `activate` run on the persisted artifact
    /// under the model lock.
    pub fn tune_then<F>(
        &self,
        dataset: &Dataset,
        request: &TuneRequest,
        activate: F,
    ) -> Result<TuningOutcome, TrainerError>
    where
        F: FnOnce(&ModelArtifact),
    {
        let _guard = self.lock.lock();

        let derived = derive_features(dataset);
        let matrix = LabelledMatrix::from_dataset(&derived, MIN_TUNE_ROWS)?;
        let result = grid_search(&matrix, &self.grid, &self.config, request.cv)?;

        let params = result.best_params.apply(&self.config);
        let model = GbdtTrainer::new(params.clone()).fit(&matrix.features, &matrix.labels)?;
        let n_rows = matrix.labels.len();
        let artifact = ModelArtifact::new(matrix.feature_columns, params, model, n_rows, 0)?
            .with_cv_score(result.best_score);
        artifact.save(&self.model_path)?;
        activate(&artifact);

        info!(
            best_score = result.best_score,
            learning_rate = result.best_params.learning_rate,
            max_depth = result.best_params.max_depth,
            n_estimators = result.best_params.n_estimators,
            n_folds = result.n_folds,
            "tuned model"
        );

        Ok(TuningOutcome { result, artifact })
    }
}
