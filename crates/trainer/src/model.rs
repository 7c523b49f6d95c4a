//! GBDT classifier model with deterministic inference
//!
//! Trees store learning-rate-scaled leaf values; the ensemble margin is the
//! base score (log-odds) plus the sum of leaf values, and the positive-class
//! probability is the logistic sigmoid of the margin.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// Internal nodes route `feature <= threshold` to `left`, otherwise `right`.
/// Leaf nodes carry `value` and ignore the other fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub feature_index: u32,
    pub threshold: f64,
    pub left: u32,
    pub right: u32,
    pub value: Option<f64>,
}

impl Node {
    pub fn leaf(value: f64) -> Self {
        Self {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }

    pub fn split(feature_index: u32, threshold: f64) -> Self {
        Self {
            feature_index,
            threshold,
            left: 0,
            right: 0,
            value: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }
}

/// A single regression tree over the log-odds (node 0 is the root)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Evaluate this tree on a feature vector
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0; // Invalid tree structure
            };

            if let Some(value) = node.value {
                return value;
            }

            let Some(&feature_value) = features.get(node.feature_index as usize) else {
                return 0.0;
            };

            idx = if feature_value <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    /// Multiply every leaf by `factor` (applies the learning rate).
    pub fn scale_leaves(&mut self, factor: f64) {
        for node in &mut self.nodes {
            if let Some(value) = node.value.as_mut() {
                *value *= factor;
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(tree: &Tree, idx: usize) -> usize {
            match tree.nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(tree, node.left as usize).max(walk(tree, node.right as usize))
                }
                _ => 0,
            }
        }
        walk(self, 0)
    }

    /// Validate tree structure
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(value) = node.value {
                if !value.is_finite() {
                    return Err(format!("node {i} has a non-finite leaf value"));
                }
                continue;
            }
            if node.feature_index as usize >= feature_count {
                return Err(format!(
                    "node {i} splits on feature {} but the model has {feature_count}",
                    node.feature_index
                ));
            }
            // Children are always appended after their parent.
            for child in [node.left, node.right] {
                let child = child as usize;
                if child <= i || child >= self.nodes.len() {
                    return Err(format!("node {i} has invalid child index {child}"));
                }
            }
        }

        Ok(())
    }
}

/// Binary GBDT classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GbdtModel {
    /// Initial log-odds shared by every prediction
    pub base_score: f64,
    pub feature_count: usize,
    pub trees: Vec<Tree>,
}

impl GbdtModel {
    /// Raw ensemble output (log-odds)
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.evaluate(features))
    }

    /// Positive-class probability
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }

    /// Predicted 0/1 label (threshold 0.5)
    pub fn predict_label(&self, features: &[f64]) -> u8 {
        u8::from(self.predict_proba(features) >= 0.5)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.base_score.is_finite() {
            return Err("base score is not finite".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count)
                .map_err(|err| format!("tree {i}: {err}"))?;
        }
        Ok(())
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Fraction of rows whose predicted label equals the true label.
pub fn accuracy(model: &GbdtModel, features: &[Vec<f64>], labels: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = features
        .iter()
        .zip(labels)
        .filter(|(row, label)| model.predict_label(row) == **label)
        .count();
    correct as f64 / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        let mut root = Node::split(0, 1.5);
        root.left = 1;
        root.right = 2;
        Tree {
            nodes: vec![root, Node::leaf(-2.0), Node::leaf(2.0)],
        }
    }

    #[test]
    fn evaluates_left_on_equal_threshold() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[1.5]), -2.0);
        assert_eq!(tree.evaluate(&[1.6]), 2.0);
        assert_eq!(tree.evaluate(&[]), 0.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn model_predicts_labels_from_margin() {
        let model = GbdtModel {
            base_score: 0.0,
            feature_count: 1,
            trees: vec![stump()],
        };
        assert_eq!(model.predict_label(&[1.0]), 0);
        assert_eq!(model.predict_label(&[3.0]), 1);
        assert!((model.predict_proba(&[3.0]) - sigmoid(2.0)).abs() < 1e-12);
        assert!(model.validate().is_ok());

        let acc = accuracy(&model, &[vec![1.0], vec![3.0], vec![3.0]], &[0, 1, 0]);
        assert!((acc - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_bad_children() {
        let mut tree = stump();
        tree.nodes[0].left = 7;
        assert!(tree.validate(1).is_err());
        assert!(stump().validate(0).is_err());
    }

    #[test]
    fn scale_leaves_only_touches_leaves() {
        let mut tree = stump();
        tree.scale_leaves(0.5);
        assert_eq!(tree.nodes[0].threshold, 1.5);
        assert_eq!(tree.nodes[1].value, Some(-1.0));
        assert_eq!(tree.nodes[2].value, Some(1.0));
    }
}
