//! Grid-search hyperparameter tuning with contiguous k-fold cross validation.

use serde::{Deserialize, Serialize};

use crate::errors::TrainerError;
use crate::matrix::LabelledMatrix;
use crate::model::accuracy;
use crate::split::k_fold;
use crate::trainer::{GbdtConfig, GbdtTrainer};

pub const DEFAULT_CV_FOLDS: usize = 3;

/// Body of a tuning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneRequest {
    pub cv: usize,
}

impl Default for TuneRequest {
    fn default() -> Self {
        Self {
            cv: DEFAULT_CV_FOLDS,
        }
    }
}

/// The searched hyperparameters of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunedParams {
    pub learning_rate: f64,
    pub max_depth: usize,
    pub n_estimators: usize,
}

impl TunedParams {
    /// `base` with the searched fields overridden.
    pub fn apply(&self, base: &GbdtConfig) -> GbdtConfig {
        GbdtConfig {
            num_trees: self.n_estimators,
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
            ..base.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub n_estimators: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            learning_rate: vec![0.1, 0.01],
            max_depth: vec![3, 6],
            n_estimators: vec![50, 100],
        }
    }
}

impl ParamGrid {
    /// Every combination; the last field varies fastest.
    pub fn candidates(&self) -> Vec<TunedParams> {
        let mut candidates = Vec::new();
        for &learning_rate in &self.learning_rate {
            for &max_depth in &self.max_depth {
                for &n_estimators in &self.n_estimators {
                    candidates.push(TunedParams {
                        learning_rate,
                        max_depth,
                        n_estimators,
                    });
                }
            }
        }
        candidates
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub best_params: TunedParams,
    /// Mean fold accuracy of the best candidate.
    pub best_score: f64,
    pub n_folds: usize,
    pub candidates: usize,
}

/// Score every grid candidate by mean k-fold accuracy. Ties keep the
/// earlier candidate.
pub fn grid_search(
    matrix: &LabelledMatrix,
    grid: &ParamGrid,
    base: &GbdtConfig,
    cv: usize,
) -> Result<TuningResult, TrainerError> {
    let n = matrix.len();
    if cv < 2 || cv > n {
        return Err(TrainerError::invalid_input(format!(
            "cv must be between 2 and the number of labelled rows ({n}), got {cv}"
        )));
    }

    let candidates = grid.candidates();
    if candidates.is_empty() {
        return Err(TrainerError::invalid_input("parameter grid is empty"));
    }

    let folds = k_fold(n, cv);
    let mut best: Option<(TunedParams, f64)> = None;

    for params in &candidates {
        let trainer = GbdtTrainer::new(params.apply(base));
        let mut total = 0.0;
        for fold in &folds {
            let (train_x, train_y) = matrix.subset(&fold.train);
            let (test_x, test_y) = matrix.subset(&fold.test);
            let model = trainer.fit(&train_x, &train_y)?;
            total += accuracy(&model, &test_x, &test_y);
        }
        let score = total / folds.len() as f64;

        tracing::debug!(
            learning_rate = params.learning_rate,
            max_depth = params.max_depth,
            n_estimators = params.n_estimators,
            score,
            "scored tuning candidate"
        );

        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((*params, score));
        }
    }

    let (best_params, best_score) =
        best.ok_or_else(|| TrainerError::invalid_input("no tuning candidate was scored"))?;

    Ok(TuningResult {
        best_params,
        best_score,
        n_folds: folds.len(),
        candidates: candidates.len(),
    })
}
