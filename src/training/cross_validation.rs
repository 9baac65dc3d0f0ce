//! K-fold cross-validation splits

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ShapeClassError};

/// A single train/test split, expressed as indices into the dataset
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Shuffled K-fold splitter.
///
/// Every fold holds `n_samples / n_splits` contiguous samples of the shuffled
/// order. The `n_samples % n_splits` trailing samples are dropped rather than
/// redistributed, so they take part in neither training nor validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Shuffle `0..n_samples` with `rng` and cut it into folds
    pub fn split<R: Rng + ?Sized>(&self, n_samples: usize, rng: &mut R) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(ShapeClassError::invalid_parameter(
                "folds",
                n_splits,
                "at least 2 folds are required",
            ));
        }
        if n_samples < n_splits {
            return Err(ShapeClassError::invalid_parameter(
                "folds",
                n_splits,
                format!("cannot exceed the number of samples ({})", n_samples),
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(rng);

        let fold_size = n_samples / n_splits;
        let dropped = n_samples % n_splits;
        if dropped > 0 {
            warn!(dropped, n_samples, n_splits, "Trailing samples left out of every fold");
        }
        indices.truncate(fold_size * n_splits);

        let folds: Vec<&[usize]> = indices.chunks(fold_size).collect();
        let splits = (0..n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].to_vec(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect();

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: 0.0,
                std_score: 0.0,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_k_fold() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let splits = KFold::new(5).split(100, &mut rng).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_remainder_is_dropped() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let splits = KFold::new(5).split(23, &mut rng).unwrap();

        let mut covered: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        assert_eq!(covered.len(), 20);
        covered.sort();
        covered.dedup();
        assert_eq!(covered.len(), 20);

        for split in &splits {
            assert_eq!(split.test_indices.len(), 4);
            assert_eq!(split.train_indices.len(), 16);
            for idx in &split.test_indices {
                assert!(!split.train_indices.contains(idx));
            }
        }
    }

    #[test]
    fn test_invalid_fold_counts() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(KFold::new(1).split(10, &mut rng).is_err());
        assert!(KFold::new(11).split(10, &mut rng).is_err());
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.5, 1.0, 0.75, 0.75]);
        assert_eq!(results.n_folds, 4);
        assert!((results.mean_score - 0.75).abs() < 1e-12);
        assert!(results.std_score > 0.0);
    }
}
