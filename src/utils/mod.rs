//! Utility functions and types

pub mod data_loader;
pub mod export;

pub use data_loader::{DataReader, DatasetSummary, Descriptor, DEFAULT_SAMPLES_PER_CLASS};
pub use export::{export_features_csv, export_labels_csv, features_frame, labels_frame};
