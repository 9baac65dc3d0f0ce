//! Shuffle-and-split of a dataset into training and test partitions

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::Sample;
use crate::error::{Result, ShapeClassError};

/// Seed giving the historical fixed split of the BDshape experiments
pub const DEFAULT_SPLIT_SEED: u64 = 456;

/// Training / test partitions produced by [`DatasetSplitter`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub train: Vec<Sample>,
    pub test: Vec<Sample>,
}

/// Splits a dataset after shuffling a copy of it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplitter {
    train_ratio: f64,
    random_state: Option<u64>,
}

impl DatasetSplitter {
    pub fn new(train_ratio: f64) -> Self {
        Self {
            train_ratio,
            random_state: Some(DEFAULT_SPLIT_SEED),
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Draw the shuffle from entropy instead of a fixed seed
    pub fn with_entropy(mut self) -> Self {
        self.random_state = None;
        self
    }

    /// Split `data_set` without touching it. The training part holds
    /// `floor(len * train_ratio)` samples.
    pub fn split(&self, data_set: &[Sample]) -> Result<DatasetSplit> {
        if !(0.0..=1.0).contains(&self.train_ratio) {
            return Err(ShapeClassError::invalid_parameter(
                "train_ratio",
                self.train_ratio,
                "must lie in [0, 1]",
            ));
        }

        let mut indices: Vec<usize> = (0..data_set.len()).collect();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        indices.shuffle(&mut rng);

        let train_size = (data_set.len() as f64 * self.train_ratio).floor() as usize;
        let (train_idx, test_idx) = indices.split_at(train_size);

        Ok(DatasetSplit {
            train: train_idx.iter().map(|&i| data_set[i].clone()).collect(),
            test: test_idx.iter().map(|&i| data_set[i].clone()).collect(),
        })
    }
}
