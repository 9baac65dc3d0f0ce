//! K-Nearest Neighbors classifier
//!
//! Majority vote among the `k` training samples closest to the query under a
//! Minkowski distance of order `p`.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tracing::debug;

use super::cross_validation::{CVResults, KFold};
use super::distance::{check_order, minkowski};
use crate::data::{Label, Sample};
use crate::error::{Result, ShapeClassError};
use crate::evaluation::{ConfusionMatrix, EvaluationReport, OneVsRest};
use crate::optimizer::{GridSearch, HyperparameterResult, SearchConfig};

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Minkowski order
    pub p: u32,
    /// Seed for the cross-validation shuffles
    pub random_state: Option<u64>,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            p: 2,
            random_state: None,
        }
    }
}

impl KNNConfig {
    pub fn with_k(mut self, k: usize) -> Self {
        self.n_neighbors = k;
        self
    }

    pub fn with_p(mut self, p: u32) -> Self {
        self.p = p;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

/// K-Nearest Neighbors Classifier.
///
/// The classifier keeps no training data of its own: every operation takes the
/// training set as an argument and only reads it.
#[derive(Debug, Clone)]
pub struct KNNClassifier {
    config: KNNConfig,
    rng: ChaCha8Rng,
}

impl Default for KNNClassifier {
    fn default() -> Self {
        let config = KNNConfig::default();
        Self {
            rng: rng_from(config.random_state),
            config,
        }
    }
}

fn rng_from(random_state: Option<u64>) -> ChaCha8Rng {
    match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Result<Self> {
        if config.n_neighbors == 0 {
            return Err(ShapeClassError::invalid_parameter(
                "k",
                config.n_neighbors,
                "at least one neighbor is required",
            ));
        }
        check_order(config.p)?;
        Ok(Self {
            rng: rng_from(config.random_state),
            config,
        })
    }

    /// Create with the given neighbor count and Minkowski order
    pub fn with_params(k: usize, p: u32) -> Result<Self> {
        Self::new(KNNConfig::default().with_k(k).with_p(p))
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    pub fn k(&self) -> usize {
        self.config.n_neighbors
    }

    pub fn p(&self) -> u32 {
        self.config.p
    }

    /// Predict the label of `sample`.
    ///
    /// Neighbors are ranked on a copy of the training indices with a stable
    /// sort, so equal distances keep training-set order. When several labels
    /// share the highest vote count, the one met first in neighbor order wins.
    /// If `k` exceeds the training set size, every training sample votes.
    pub fn classify<S: Borrow<Sample>>(&self, training_set: &[S], sample: &Sample) -> Result<Label> {
        if training_set.is_empty() {
            return Err(ShapeClassError::EmptyInput(
                "cannot classify against an empty training set".to_string(),
            ));
        }

        let mut ranked = training_set
            .iter()
            .enumerate()
            .map(|(idx, s)| minkowski(s.borrow().features(), sample.features(), self.config.p).map(|d| (d, idx)))
            .collect::<Result<Vec<(f32, usize)>>>()?;
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k = self.config.n_neighbors.min(ranked.len());
        let mut votes: Vec<(Label, usize)> = Vec::with_capacity(k);
        for &(_, idx) in &ranked[..k] {
            let label = training_set[idx].borrow().label();
            match votes.iter_mut().find(|(l, _)| *l == label) {
                Some(entry) => entry.1 += 1,
                None => votes.push((label, 1)),
            }
        }

        let mut best = votes[0];
        for &candidate in &votes[1..] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        Ok(best.0)
    }

    /// Predict the label of every test sample
    pub fn predict<S, T>(&self, training_set: &[S], test_set: &[T]) -> Result<Vec<Label>>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        test_set
            .iter()
            .map(|s| self.classify(training_set, s.borrow()))
            .collect()
    }

    /// `(actual, predicted)` for every test sample
    fn prediction_pairs<S, T>(&self, training_set: &[S], test_set: &[T]) -> Result<Vec<(Label, Label)>>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        let predictions = self.predict(training_set, test_set)?;
        Ok(test_set
            .iter()
            .zip(predictions)
            .map(|(s, predicted)| (s.borrow().label(), predicted))
            .collect())
    }

    /// Fraction of `test_set` classified correctly.
    ///
    /// `None` when either set is empty: the score is undefined, which can
    /// happen with adversarial splits and is left to the caller.
    pub fn score<S, T>(&self, training_set: &[S], test_set: &[T]) -> Result<Option<f64>>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        if training_set.is_empty() || test_set.is_empty() {
            return Ok(None);
        }
        let pairs = self.prediction_pairs(training_set, test_set)?;
        let correct = pairs.iter().filter(|(actual, predicted)| actual == predicted).count();
        Ok(Some(correct as f64 / test_set.len() as f64))
    }

    /// K-fold cross-validation with per-fold scores
    pub fn cross_validate<S: Borrow<Sample>>(&mut self, data_set: &[S], folds: usize) -> Result<CVResults> {
        let splits = KFold::new(folds).split(data_set.len(), &mut self.rng)?;

        let mut scores = Vec::with_capacity(splits.len());
        for split in &splits {
            let training: Vec<&Sample> = split.train_indices.iter().map(|&i| data_set[i].borrow()).collect();
            let validation: Vec<&Sample> = split.test_indices.iter().map(|&i| data_set[i].borrow()).collect();

            let score = self.score(&training, &validation)?.ok_or_else(|| {
                ShapeClassError::EmptyInput(format!("fold {} has no samples", split.fold_idx))
            })?;
            debug!(fold = split.fold_idx, k = self.k(), p = self.p(), score, "Fold scored");
            scores.push(score);
        }

        Ok(CVResults::from_scores(scores))
    }

    /// Mean K-fold cross-validation score over a shuffled copy of `data_set`
    pub fn cross_validation<S: Borrow<Sample>>(&mut self, data_set: &[S], folds: usize) -> Result<f64> {
        Ok(self.cross_validate(data_set, folds)?.mean_score)
    }

    /// Grid-search `k` and `p` with repeated cross-validation
    pub fn find_best_hyperparameters<S>(&self, training_set: &[S], p_candidates: &[u32]) -> Result<HyperparameterResult>
    where
        S: Borrow<Sample> + Sync,
    {
        let mut config = SearchConfig::default().with_p_candidates(p_candidates.to_vec());
        config.random_state = self.config.random_state;
        GridSearch::new(config).run(training_set)
    }

    pub fn confusion_matrix<S, T>(&self, training_set: &[S], test_set: &[T], num_classes: usize) -> Result<ConfusionMatrix>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        let pairs = self.prediction_pairs(training_set, test_set)?;
        ConfusionMatrix::from_predictions(pairs, num_classes)
    }

    pub fn precision<S, T>(&self, training_set: &[S], test_set: &[T], class_id: Label) -> Result<f64>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        let pairs = self.prediction_pairs(training_set, test_set)?;
        Ok(OneVsRest::from_pairs(pairs, class_id).precision())
    }

    pub fn recall<S, T>(&self, training_set: &[S], test_set: &[T], class_id: Label) -> Result<f64>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        let pairs = self.prediction_pairs(training_set, test_set)?;
        Ok(OneVsRest::from_pairs(pairs, class_id).recall())
    }

    pub fn f1_score<S, T>(&self, training_set: &[S], test_set: &[T], class_id: Label) -> Result<f64>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        let pairs = self.prediction_pairs(training_set, test_set)?;
        Ok(OneVsRest::from_pairs(pairs, class_id).f1_score())
    }

    /// Full evaluation on a held-out test set
    pub fn evaluate<S, T>(&self, training_set: &[S], test_set: &[T], num_classes: usize) -> Result<EvaluationReport>
    where
        S: Borrow<Sample>,
        T: Borrow<Sample>,
    {
        self.confusion_matrix(training_set, test_set, num_classes)?.report()
    }
}
