//! Exhaustive `(k, p)` search for the KNN classifier

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use super::config::SearchConfig;
use crate::data::Sample;
use crate::error::{Result, ShapeClassError};
use crate::training::cross_validation::CVResults;
use crate::training::knn::{KNNClassifier, KNNConfig};

/// Averaged cross-validation outcome of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPoint {
    pub k: usize,
    pub p: u32,
    /// Mean of the repeated cross-validation scores
    pub mean_score: f64,
    /// Spread of the repeated cross-validation scores
    pub std_score: f64,
}

/// Winner of a grid search plus every evaluated point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperparameterResult {
    pub k: usize,
    pub p: u32,
    pub score: f64,
    pub grid: Vec<GridPoint>,
    pub total_duration_secs: f64,
}

impl HyperparameterResult {
    /// Flat `{k, p, accuracy}` map for reporters
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("k".to_string(), self.k as f64),
            ("p".to_string(), self.p as f64),
            ("accuracy".to_string(), self.score),
        ])
    }

    /// Classifier configured with the winning parameters
    pub fn classifier(&self) -> Result<KNNClassifier> {
        KNNClassifier::with_params(self.k, self.p)
    }
}

/// Grid search over `k` × `p` driven by repeated cross-validation
#[derive(Debug, Clone)]
pub struct GridSearch {
    config: SearchConfig,
}

impl GridSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn validate(&self) -> Result<()> {
        let config = &self.config;
        if config.k_values.is_empty() {
            return Err(ShapeClassError::invalid_parameter("k_values", "[]", "no k to search"));
        }
        if config.p_candidates.is_empty() {
            return Err(ShapeClassError::invalid_parameter("p_candidates", "[]", "no p to search"));
        }
        if config.repeats == 0 {
            return Err(ShapeClassError::invalid_parameter(
                "repeats",
                config.repeats,
                "at least one cross-validation run per grid point is required",
            ));
        }
        Ok(())
    }

    /// Cross-validate one `(k, p)` pair once per seed
    fn evaluate_point<S>(&self, data_set: &[S], k: usize, p: u32, seeds: &[u64]) -> Result<CVResults>
    where
        S: Borrow<Sample> + Sync,
    {
        let folds = self.config.folds;
        let run = |seed: u64| -> Result<f64> {
            let config = KNNConfig::default().with_k(k).with_p(p).with_random_state(seed);
            KNNClassifier::new(config)?.cross_validation(data_set, folds)
        };

        let scores: Vec<f64> = if self.config.parallel {
            seeds.par_iter().map(|&seed| run(seed)).collect::<Result<_>>()?
        } else {
            seeds.iter().map(|&seed| run(seed)).collect::<Result<_>>()?
        };
        Ok(CVResults::from_scores(scores))
    }

    /// Run the search. Points are visited `k`-major, `p`-minor; ties between
    /// equal mean scores follow [`SearchConfig::tie_break`].
    pub fn run<S>(&self, data_set: &[S]) -> Result<HyperparameterResult>
    where
        S: Borrow<Sample> + Sync,
    {
        self.validate()?;
        let start = Instant::now();
        let mut master = match self.config.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut grid: Vec<GridPoint> = Vec::with_capacity(self.config.k_values.len() * self.config.p_candidates.len());
        let mut best_idx: Option<usize> = None;

        for &k in &self.config.k_values {
            for &p in &self.config.p_candidates {
                let seeds: Vec<u64> = (0..self.config.repeats).map(|_| master.gen()).collect();
                let results = self.evaluate_point(data_set, k, p, &seeds)?;
                debug!(k, p, mean = results.mean_score, std = results.std_score, "Grid point evaluated");

                let is_better = match best_idx {
                    None => true,
                    Some(idx) => self.config.tie_break.prefers(results.mean_score, grid[idx].mean_score),
                };
                grid.push(GridPoint {
                    k,
                    p,
                    mean_score: results.mean_score,
                    std_score: results.std_score,
                });
                if is_better {
                    best_idx = Some(grid.len() - 1);
                }
            }
        }

        let best: &GridPoint = best_idx
            .and_then(|idx| grid.get(idx))
            .ok_or_else(|| ShapeClassError::EmptyInput("grid search evaluated nothing".to_string()))?;
        let (k, p, score) = (best.k, best.p, best.mean_score);
        let total_duration_secs = start.elapsed().as_secs_f64();
        info!(k, p, score, points = grid.len(), secs = total_duration_secs, "Grid search finished");

        Ok(HyperparameterResult {
            k,
            p,
            score,
            grid,
            total_duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::TieBreak;

    fn two_blobs() -> Vec<Sample> {
        let mut data = Vec::new();
        for i in 0..10 {
            let offset = i as f32 * 0.1;
            data.push(Sample::new(vec![offset, 1.0 - offset], 1));
            data.push(Sample::new(vec![10.0 + offset, 10.0 - offset], 2));
        }
        data
    }

    #[test]
    fn test_last_seen_tie_break_picks_largest() {
        // Every point scores 1.0 on well separated blobs
        let config = SearchConfig::default()
            .with_k_values(1..=3)
            .with_p_candidates(vec![1, 2])
            .with_repeats(2)
            .with_random_state(5);
        let result = GridSearch::new(config).run(&two_blobs()).unwrap();
        assert_eq!(result.grid.len(), 6);
        assert_eq!((result.k, result.p), (3, 2));
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_first_seen_tie_break_picks_smallest() {
        let config = SearchConfig::default()
            .with_k_values(1..=3)
            .with_p_candidates(vec![1, 2])
            .with_repeats(2)
            .with_tie_break(TieBreak::FirstSeen)
            .with_random_state(5);
        let result = GridSearch::new(config).run(&two_blobs()).unwrap();
        assert_eq!((result.k, result.p), (1, 1));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let base = SearchConfig::default()
            .with_k_values([1, 5, 9])
            .with_p_candidates(vec![2])
            .with_repeats(4)
            .with_random_state(17);
        let parallel = GridSearch::new(base.clone()).run(&two_blobs()).unwrap();
        let sequential = GridSearch::new(base.with_parallel(false)).run(&two_blobs()).unwrap();
        let a: Vec<f64> = parallel.grid.iter().map(|g| g.mean_score).collect();
        let b: Vec<f64> = sequential.grid.iter().map(|g| g.mean_score).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_result_map() {
        let config = SearchConfig::default()
            .with_k_values([1])
            .with_p_candidates(vec![2])
            .with_repeats(1)
            .with_random_state(1);
        let map = GridSearch::new(config).run(&two_blobs()).unwrap().to_map();
        assert_eq!(map["k"], 1.0);
        assert_eq!(map["p"], 2.0);
        assert!(map.contains_key("accuracy"));
    }

    #[test]
    fn test_invalid_configs() {
        let data = two_blobs();
        assert!(GridSearch::new(SearchConfig::default().with_repeats(0)).run(&data).is_err());
        assert!(GridSearch::new(SearchConfig::default().with_p_candidates(vec![])).run(&data).is_err());
        assert!(GridSearch::new(SearchConfig::default().with_k_values(Vec::new())).run(&data).is_err());
    }
}
