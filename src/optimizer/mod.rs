//! Hyperparameter search
//!
//! Exhaustive grid search over the KNN neighbor count `k` and Minkowski
//! order `p`, scored by repeated K-fold cross-validation.

mod config;
mod grid_search;

pub use config::{SearchConfig, TieBreak};
pub use grid_search::{GridPoint, GridSearch, HyperparameterResult};
