//! CART (Classification and Regression Tree) builder
//!
//! Deterministic exact-greedy construction of a second-order regression tree
//! over gradients/hessians of the boosting loss. Candidate thresholds are the
//! midpoints between consecutive distinct feature values.

use crate::deterministic::SplitTieBreaker;
use crate::model::{Node, Tree};

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
    /// L2 regularisation on leaf values
    pub lambda: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 1,
            min_child_weight: 1.0,
            lambda: 1.0,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, current: &SplitCandidate) -> bool {
        self.gain > current.gain
            || (self.gain == current.gain && self.tie_breaker < current.tie_breaker)
    }
}

/// Build a regression tree using exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    /// `features`, `gradients` and `hessians` must have equal length.
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        let feature_count = features.first().map(Vec::len).unwrap_or(0);

        Self {
            config,
            features,
            gradients,
            hessians,
            feature_count,
        }
    }

    /// Build tree over all samples
    pub fn build(&self) -> Tree {
        let indices: Vec<usize> = (0..self.features.len()).collect();
        self.build_on(&indices)
    }

    /// Build tree over a subset of samples
    pub fn build_on(&self, indices: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(indices, 0, &mut nodes, 0);
        Tree { nodes }
    }

    /// Recursively build tree nodes
    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        node_id: usize,
    ) -> u32 {
        let current_idx = nodes.len() as u32;

        let split = if depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            None
        } else {
            self.find_best_split(indices, node_id)
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(self.calculate_leaf_value(indices)));
            return current_idx;
        };

        let (left_indices, right_indices) =
            self.split_samples(indices, split.feature_idx, split.threshold);

        // Reserve space for current node
        nodes.push(Node::split(split.feature_idx as u32, split.threshold));

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, node_id * 2 + 1);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, node_id * 2 + 2);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Find best split using exact-greedy scan over sorted feature values
    fn find_best_split(&self, indices: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let (g_parent, h_parent) = self.sum_gradients_hessians(indices);
        let parent_score = self.structure_score(g_parent, h_parent);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best_split: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..self.feature_count {
            order.sort_by(|&a, &b| {
                self.features[a][feature_idx]
                    .total_cmp(&self.features[b][feature_idx])
                    .then(a.cmp(&b))
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            let mut threshold_rank = 0usize;

            for pos in 0..order.len() - 1 {
                let idx = order[pos];
                g_left += self.gradients[idx];
                h_left += self.hessians[idx];

                let value = self.features[idx][feature_idx];
                let next_value = self.features[order[pos + 1]][feature_idx];
                if value == next_value {
                    continue;
                }
                threshold_rank += 1;

                let n_left = pos + 1;
                let n_right = order.len() - n_left;
                let g_right = g_parent - g_left;
                let h_right = h_parent - h_left;

                if n_left < min_leaf
                    || n_right < min_leaf
                    || h_left < self.config.min_child_weight
                    || h_right < self.config.min_child_weight
                {
                    continue;
                }

                let gain = self.structure_score(g_left, h_left)
                    + self.structure_score(g_right, h_right)
                    - parent_score;
                if gain.is_nan() || gain <= 0.0 {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold: value + (next_value - value) / 2.0,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, threshold_rank, node_id),
                };

                best_split = match best_split {
                    Some(current) if !candidate.beats(&current) => Some(current),
                    _ => Some(candidate),
                };
            }
        }

        best_split
    }

    /// Split samples based on threshold
    fn split_samples(
        &self,
        indices: &[usize],
        feature_idx: usize,
        threshold: f64,
    ) -> (Vec<usize>, Vec<usize>) {
        indices
            .iter()
            .copied()
            .partition(|&idx| self.features[idx][feature_idx] <= threshold)
    }

    /// G² / (H + λ)
    fn structure_score(&self, g: f64, h: f64) -> f64 {
        (g * g) / (h + self.config.lambda)
    }

    /// Sum gradients and hessians for a set of samples
    fn sum_gradients_hessians(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &idx| {
            (g + self.gradients[idx], h + self.hessians[idx])
        })
    }

    /// Optimal leaf value: -G / (H + λ)
    fn calculate_leaf_value(&self, indices: &[usize]) -> f64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(indices);
        let denominator = sum_h + self.config.lambda;
        if denominator <= 0.0 {
            return 0.0;
        }
        -sum_g / denominator
    }
}
