//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Deterministic binary log-loss boosting over exact-greedy CART trees.
//! Each round fits a tree to the first and second derivatives of the loss at
//! the current margins, then adds the learning-rate-scaled tree to the
//! ensemble.

use serde::{Deserialize, Serialize};

use crate::cart::{CartBuilder, TreeConfig};
use crate::errors::TrainerError;
use crate::model::{sigmoid, GbdtModel, Tree};

/// Mean labels are clamped away from 0/1 before taking the logit.
const BASE_SCORE_EPSILON: f64 = 1e-6;

/// Deepest tree the builder accepts; node ids are heap positions.
pub const MAX_TREE_DEPTH: usize = 32;

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 6,
            learning_rate: 0.3,
            min_samples_leaf: 1,
            min_child_weight: 1.0,
            lambda: 1.0,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.num_trees == 0 {
            return Err(TrainerError::invalid_input("num_trees must be at least 1"));
        }
        if !(1..=MAX_TREE_DEPTH).contains(&self.max_depth) {
            return Err(TrainerError::invalid_input(format!(
                "max_depth must be between 1 and {MAX_TREE_DEPTH}"
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainerError::invalid_input(
                "learning_rate must be a positive finite number",
            ));
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(TrainerError::invalid_input("lambda must be non-negative"));
        }
        if !(self.min_child_weight.is_finite() && self.min_child_weight >= 0.0) {
            return Err(TrainerError::invalid_input(
                "min_child_weight must be non-negative",
            ));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
        }
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    /// Fit a binary classifier. `labels` must be 0 or 1 and every feature
    /// row must have the same width.
    pub fn fit(&self, features: &[Vec<f64>], labels: &[u8]) -> Result<GbdtModel, TrainerError> {
        self.config.validate()?;
        let feature_count = check_shape(features, labels)?;

        let targets: Vec<f64> = labels.iter().map(|&label| f64::from(label)).collect();
        let base_score = base_score(&targets);
        let mut margins = vec![base_score; targets.len()];

        let tree_config = self.config.tree_config();
        let mut trees = Vec::with_capacity(self.config.num_trees);

        for tree_idx in 0..self.config.num_trees {
            let (gradients, hessians) = logloss_gradients(&targets, &margins);

            let builder = CartBuilder::new(features, &gradients, &hessians, tree_config.clone());
            let mut tree = builder.build();
            tree.scale_leaves(self.config.learning_rate);

            for (margin, row) in margins.iter_mut().zip(features) {
                *margin += tree.evaluate(row);
            }

            tracing::trace!(tree = tree_idx + 1, nodes = tree.nodes.len(), "built tree");
            trees.push(tree);
        }

        tracing::debug!(
            trees = trees.len(),
            max_depth = trees.iter().map(Tree::depth).max().unwrap_or(0),
            rows = features.len(),
            features = feature_count,
            "fitted gbdt ensemble"
        );

        Ok(GbdtModel {
            base_score,
            feature_count,
            trees,
        })
    }
}

fn check_shape(features: &[Vec<f64>], labels: &[u8]) -> Result<usize, TrainerError> {
    if features.is_empty() {
        return Err(TrainerError::invalid_input("no training rows"));
    }
    if features.len() != labels.len() {
        return Err(TrainerError::invalid_input(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    if let Some(label) = labels.iter().find(|&&label| label > 1) {
        return Err(TrainerError::invalid_input(format!(
            "label {label} is not binary"
        )));
    }

    let feature_count = features[0].len();
    if feature_count == 0 {
        return Err(TrainerError::invalid_input("no feature columns"));
    }
    if let Some(row) = features.iter().position(|row| row.len() != feature_count) {
        return Err(TrainerError::invalid_input(format!(
            "row {row} has {} features, expected {feature_count}",
            features[row].len()
        )));
    }
    Ok(feature_count)
}

/// Log-odds of the (clamped) positive rate.
fn base_score(targets: &[f64]) -> f64 {
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let p = mean.clamp(BASE_SCORE_EPSILON, 1.0 - BASE_SCORE_EPSILON);
    (p / (1.0 - p)).ln()
}

/// Binary log-loss derivatives w.r.t. the margin:
/// gradient = p - y, hessian = p (1 - p)
fn logloss_gradients(targets: &[f64], margins: &[f64]) -> (Vec<f64>, Vec<f64>) {
    targets
        .iter()
        .zip(margins)
        .map(|(&y, &margin)| {
            let p = sigmoid(margin);
            (p - y, p * (1.0 - p))
        })
        .unzip()
}
