//! ShapeClass - shape descriptor classification
//!
//! Classifies BDshape shape descriptors (E34, F0, GFD, SA) with a
//! K-Nearest Neighbors classifier and with K-Means clustering used as a
//! classifier, and evaluates both with confusion matrices and per-class
//! precision, recall and F1.
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`data`] - Samples, labels, centroids and train/test splitting
//! - [`training`] - Distances, KNN, K-Means and cross-validation
//! - [`evaluation`] - Confusion matrix and classification metrics
//! - [`optimizer`] - Grid search over KNN hyperparameters
//!
//! ## Services
//! - [`cli`] - Command-line interface
//!
//! ## Utilities
//! - [`utils`] - Descriptor file reader and CSV export

// Core error handling
pub mod error;

// Core ML modules
pub mod data;
pub mod training;
pub mod evaluation;
pub mod optimizer;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, ShapeClassError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, ShapeClassError};

    // Data model
    pub use crate::data::{Centroid, DatasetSplit, DatasetSplitter, Label, LabelName, Sample};

    // Training
    pub use crate::training::{
        minkowski, select_best_model, KMeansClassifier, KMeansConfig, KMeansEngine, KNNClassifier, KNNConfig,
        Seeding,
    };

    // Evaluation
    pub use crate::evaluation::{ConfusionMatrix, EvaluationReport};

    // Optimization
    pub use crate::optimizer::{GridSearch, SearchConfig, TieBreak};

    // Data loading
    pub use crate::utils::{DataReader, Descriptor};
}
