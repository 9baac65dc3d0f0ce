//! Data model: labeled samples, class names and cluster centroids

mod splitter;

pub use splitter::{DatasetSplit, DatasetSplitter};

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ShapeClassError};

/// Class identifier. `0` means unlabeled, `1..=C` are real classes.
pub type Label = u32;

/// Label value meaning "no class"
pub const UNLABELED: Label = 0;

/// Number of classes in the BDshape reference dataset
pub const DEFAULT_NUM_CLASSES: usize = 9;

/// A labeled feature vector extracted from a shape descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    features: Array1<f32>,
    label: Label,
}

impl Sample {
    pub fn new(features: Vec<f32>, label: Label) -> Self {
        Self {
            features: Array1::from_vec(features),
            label,
        }
    }

    /// Create a sample carrying the [`UNLABELED`] label
    pub fn unlabeled(features: Vec<f32>) -> Self {
        Self::new(features, UNLABELED)
    }

    pub fn features(&self) -> ArrayView1<'_, f32> {
        self.features.view()
    }

    pub fn feature(&self, index: usize) -> Option<f32> {
        self.features.get(index).copied()
    }

    pub fn dim(&self) -> usize {
        self.features.len()
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_labeled(&self) -> bool {
        self.label != UNLABELED
    }
}

/// Check that every sample has the same feature-vector length.
///
/// Returns the shared length, or `None` for an empty slice.
pub fn common_dimension(samples: &[Sample]) -> Result<Option<usize>> {
    let Some(first) = samples.first() else {
        return Ok(None);
    };
    let expected = first.dim();
    for sample in samples {
        if sample.dim() != expected {
            return Err(ShapeClassError::DimensionMismatch {
                expected,
                actual: sample.dim(),
            });
        }
    }
    Ok(Some(expected))
}

/// Class names of the BDshape reference dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelName {
    Unlabeled,
    Poisson,
    Lapin,
    Silhouette,
    Avion,
    Main,
    Outil,
    Bidule,
    Animal,
    Raie,
}

impl LabelName {
    const ALL: [LabelName; 10] = [
        LabelName::Unlabeled,
        LabelName::Poisson,
        LabelName::Lapin,
        LabelName::Silhouette,
        LabelName::Avion,
        LabelName::Main,
        LabelName::Outil,
        LabelName::Bidule,
        LabelName::Animal,
        LabelName::Raie,
    ];

    pub fn number(self) -> Label {
        self as Label
    }
}

impl TryFrom<Label> for LabelName {
    type Error = ShapeClassError;

    fn try_from(value: Label) -> Result<Self> {
        LabelName::ALL.get(value as usize).copied().ok_or_else(|| {
            ShapeClassError::invalid_parameter("label", value, "expected a class number in 0..=9")
        })
    }
}

impl fmt::Display for LabelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabelName::Unlabeled => "unlabeled",
            LabelName::Poisson => "poisson",
            LabelName::Lapin => "lapin",
            LabelName::Silhouette => "silhouette",
            LabelName::Avion => "avion",
            LabelName::Main => "main",
            LabelName::Outil => "outil",
            LabelName::Bidule => "bidule",
            LabelName::Animal => "animal",
            LabelName::Raie => "raie",
        };
        f.write_str(name)
    }
}

/// Representative point of a cluster, labeled after clustering converges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    coordinates: Array1<f32>,
    label: Option<Label>,
}

impl Centroid {
    pub fn new(coordinates: Array1<f32>) -> Self {
        Self {
            coordinates,
            label: None,
        }
    }

    pub fn coordinates(&self) -> ArrayView1<'_, f32> {
        self.coordinates.view()
    }

    /// Assigned label, `None` until the owning classifier labels the cluster
    pub fn label(&self) -> Option<Label> {
        self.label
    }

    pub fn set_label(&mut self, label: Label) {
        self.label = Some(label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_accessors() {
        let sample = Sample::new(vec![1.0, 2.5, -3.0], 4);
        assert_eq!(sample.dim(), 3);
        assert_eq!(sample.label(), 4);
        assert_eq!(sample.feature(1), Some(2.5));
        assert_eq!(sample.feature(3), None);
        assert!(sample.is_labeled());
        assert!(!Sample::unlabeled(vec![0.0]).is_labeled());
    }

    #[test]
    fn test_common_dimension() {
        let samples = vec![Sample::new(vec![0.0, 1.0], 1), Sample::new(vec![2.0, 3.0], 2)];
        assert_eq!(common_dimension(&samples).unwrap(), Some(2));
        assert_eq!(common_dimension(&[]).unwrap(), None);

        let ragged = vec![Sample::new(vec![0.0, 1.0], 1), Sample::new(vec![2.0], 2)];
        assert!(matches!(
            common_dimension(&ragged),
            Err(ShapeClassError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_label_name_conversion() {
        assert_eq!(LabelName::try_from(0).unwrap(), LabelName::Unlabeled);
        assert_eq!(LabelName::try_from(9).unwrap(), LabelName::Raie);
        assert_eq!(LabelName::Avion.number(), 4);
        assert_eq!(LabelName::Lapin.to_string(), "lapin");
        assert!(LabelName::try_from(10).is_err());
    }

    #[test]
    fn test_centroid_label_assignment() {
        let mut centroid = Centroid::new(Array1::from_vec(vec![0.5, 0.5]));
        assert_eq!(centroid.label(), None);
        centroid.set_label(3);
        assert_eq!(centroid.label(), Some(3));
        assert_eq!(centroid.coordinates().len(), 2);
    }
}
