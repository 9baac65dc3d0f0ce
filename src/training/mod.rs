//! Model training module
//!
//! Provides the classifiers used on BDshape descriptors:
//! - Minkowski distance helpers
//! - K-Nearest Neighbors with repeated K-fold cross-validation
//! - K-Means clustering (random and k-means++ seeding)
//! - K-Means used as a classifier, with multi-restart model selection

pub mod distance;
pub mod cross_validation;
pub mod knn;
pub mod kmeans;
pub mod kmeans_classifier;

pub use distance::{minkowski, nearest, EUCLIDEAN, MANHATTAN};
pub use cross_validation::{CVResults, CVSplit, KFold};
pub use knn::{KNNClassifier, KNNConfig};
pub use kmeans::{Cluster, ClusteringOutcome, ClusteringState, KMeansConfig, KMeansEngine, Seeding};
pub use kmeans_classifier::{
    select_best_model, select_best_model_with_classes, KMeansClassifier, ModelSelection, MAX_RESTARTS,
};
