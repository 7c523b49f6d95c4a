//! Deterministic row partitioning: the seeded train/validation holdout and
//! contiguous k-fold cross validation.

use crate::deterministic::LcgRng;

/// Seed shared by every holdout split.
pub const SPLIT_SEED: i64 = 42;

/// Share of rows held out for validation, in percent.
pub const VALIDATION_PERCENT: usize = 20;

/// Row indices of a holdout split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainValSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(n * percent / 100)` rows.
pub fn train_validation_split(n: usize, percent: usize, seed: i64) -> TrainValSplit {
    let n_val = (n * percent).div_ceil(100).min(n);

    let mut indices: Vec<usize> = (0..n).collect();
    LcgRng::new(seed).shuffle(&mut indices);

    let train = indices.split_off(n_val);
    TrainValSplit {
        train,
        validation: indices,
    }
}

/// One cross-validation fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Contiguous, unshuffled k-fold partition of `0..n`. The first `n % k`
/// folds get one extra test row. Callers guarantee `2 <= k <= n`.
pub fn k_fold(n: usize, k: usize) -> Vec<Fold> {
    let k = k.max(1);
    let base = n / k;
    let extra = n % k;

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        folds.push(Fold {
            train: (0..start).chain(end..n).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }
    folds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdout_size_rounds_up() {
        for (n, expected) in [(10, 2), (5, 1), (11, 3), (100, 20), (1, 1), (0, 0)] {
            let split = train_validation_split(n, VALIDATION_PERCENT, SPLIT_SEED);
            assert_eq!(split.validation.len(), expected, "n = {n}");
            assert_eq!(split.train.len(), n - expected);
        }
    }

    #[test]
    fn holdout_is_deterministic_partition() {
        let a = train_validation_split(37, VALIDATION_PERCENT, SPLIT_SEED);
        let b = train_validation_split(37, VALIDATION_PERCENT, SPLIT_SEED);
        assert_eq!(a, b);

        let mut all: Vec<usize> = a.train.iter().chain(&a.validation).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn k_fold_covers_every_row_once() {
        let folds = k_fold(10, 3);
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].test, vec![0, 1, 2, 3]);
        assert_eq!(folds[1].test, vec![4, 5, 6]);
        assert_eq!(folds[2].test, vec![7, 8, 9]);
        assert_eq!(folds[1].train, vec![0, 1, 2, 3, 7, 8, 9]);
    }
}
