//! Multi-class evaluation
//!
//! Confusion matrices, one-vs-rest precision / recall / F1 and macro-F1.
//! Any metric whose denominator is zero is defined as `0.0`.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::data::Label;
use crate::error::{Result, ShapeClassError};

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// `n_classes × n_classes` matrix of `(actual, predicted)` counts.
///
/// Stored 0-indexed; every public accessor takes 1-indexed class numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Result<Self> {
        if n_classes == 0 {
            return Err(ShapeClassError::invalid_parameter(
                "num_classes",
                n_classes,
                "at least one class is required",
            ));
        }
        Ok(Self {
            counts: Array2::zeros((n_classes, n_classes)),
        })
    }

    /// Build a matrix from `(actual, predicted)` pairs
    pub fn from_predictions<I>(pairs: I, n_classes: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (Label, Label)>,
    {
        let mut matrix = Self::new(n_classes)?;
        for (actual, predicted) in pairs {
            matrix.record(actual, predicted)?;
        }
        Ok(matrix)
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    fn index_of(&self, name: &str, class: Label) -> Result<usize> {
        let n = self.n_classes();
        if class == 0 || class as usize > n {
            return Err(ShapeClassError::invalid_parameter(
                name,
                class,
                format!("class index must lie in 1..={}", n),
            ));
        }
        Ok(class as usize - 1)
    }

    /// Count one prediction. Out-of-range labels are an error, never dropped.
    pub fn record(&mut self, actual: Label, predicted: Label) -> Result<()> {
        let row = self.index_of("actual", actual)?;
        let col = self.index_of("predicted", predicted)?;
        self.counts[[row, col]] += 1;
        Ok(())
    }

    pub fn get(&self, actual: Label, predicted: Label) -> Option<usize> {
        let row = (actual as usize).checked_sub(1)?;
        let col = (predicted as usize).checked_sub(1)?;
        self.counts.get([row, col]).copied()
    }

    /// Number of samples whose actual class is `class`
    pub fn row_sum(&self, class: Label) -> Result<usize> {
        let row = self.index_of("class", class)?;
        Ok(self.counts.row(row).sum())
    }

    /// Number of samples predicted as `class`
    pub fn column_sum(&self, class: Label) -> Result<usize> {
        let col = self.index_of("class", class)?;
        Ok(self.counts.column(col).sum())
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn counts(&self) -> ArrayView2<'_, usize> {
        self.counts.view()
    }

    /// Plain nested rows for reporters, row `i` is actual class `i + 1`
    pub fn to_rows(&self) -> Vec<Vec<usize>> {
        self.counts
            .axis_iter(Axis(0))
            .map(|row| row.to_vec())
            .collect()
    }

    fn true_positives(&self, class: Label) -> Result<usize> {
        let idx = self.index_of("class", class)?;
        Ok(self.counts[[idx, idx]])
    }

    pub fn precision(&self, class: Label) -> Result<f64> {
        Ok(ratio(self.true_positives(class)?, self.column_sum(class)?))
    }

    pub fn recall(&self, class: Label) -> Result<f64> {
        Ok(ratio(self.true_positives(class)?, self.row_sum(class)?))
    }

    pub fn f1_score(&self, class: Label) -> Result<f64> {
        Ok(harmonic_mean(self.precision(class)?, self.recall(class)?))
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.counts.diag().sum(), self.total())
    }

    fn classes(&self) -> impl Iterator<Item = Label> {
        1..=self.n_classes() as Label
    }

    /// Per-class metrics for every class `1..=n_classes`
    pub fn class_metrics(&self) -> Result<Vec<ClassMetrics>> {
        self.classes()
            .map(|class| {
                let precision = self.precision(class)?;
                let recall = self.recall(class)?;
                Ok(ClassMetrics {
                    class,
                    precision,
                    recall,
                    f1_score: harmonic_mean(precision, recall),
                    support: self.row_sum(class)?,
                })
            })
            .collect()
    }

    /// Unweighted mean of the per-class F1 scores
    pub fn macro_f1(&self) -> Result<f64> {
        let metrics = self.class_metrics()?;
        Ok(macro_average(&metrics))
    }

    pub fn report(&self) -> Result<EvaluationReport> {
        let per_class = self.class_metrics()?;
        Ok(EvaluationReport {
            accuracy: self.accuracy(),
            macro_f1: macro_average(&per_class),
            per_class,
            confusion_matrix: self.to_rows(),
            n_samples: self.total(),
        })
    }
}

fn macro_average(metrics: &[ClassMetrics]) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    metrics.iter().map(|m| m.f1_score).sum::<f64>() / metrics.len() as f64
}

/// One-vs-rest counts for a single class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneVsRest {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl OneVsRest {
    /// Tally `(actual, predicted)` pairs against `class`
    pub fn from_pairs<I>(pairs: I, class: Label) -> Self
    where
        I: IntoIterator<Item = (Label, Label)>,
    {
        let mut counts = Self::default();
        for (actual, predicted) in pairs {
            match (actual == class, predicted == class) {
                (true, true) => counts.true_positives += 1,
                (false, true) => counts.false_positives += 1,
                (true, false) => counts.false_negatives += 1,
                (false, false) => {}
            }
        }
        counts
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        harmonic_mean(self.precision(), self.recall())
    }
}

/// Metrics of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Number of samples whose actual class is `class`
    pub support: usize,
}

/// Structured evaluation result handed to reporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub macro_f1: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub n_samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Vec<(Label, Label)> {
        vec![(1, 1), (1, 1), (1, 2), (2, 2), (2, 1), (3, 3), (3, 3), (3, 2)]
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let m = ConfusionMatrix::from_predictions(pairs(), 3).unwrap();
        assert_eq!(m.get(1, 1), Some(2));
        assert_eq!(m.get(1, 2), Some(1));
        assert_eq!(m.get(3, 2), Some(1));
        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.total(), 8);
        assert_eq!(m.row_sum(1).unwrap(), 3);
        assert_eq!(m.row_sum(2).unwrap(), 2);
        assert_eq!(m.column_sum(2).unwrap(), 3);
        assert_eq!(m.to_rows(), vec![vec![2, 1, 0], vec![1, 1, 0], vec![0, 1, 2]]);
    }

    #[test]
    fn test_out_of_range_labels_are_errors() {
        let mut m = ConfusionMatrix::new(3).unwrap();
        assert!(m.record(0, 1).is_err());
        assert!(m.record(1, 4).is_err());
        assert_eq!(m.total(), 0);
        assert!(ConfusionMatrix::new(0).is_err());
    }

    #[test]
    fn test_precision_recall_f1() {
        let m = ConfusionMatrix::from_predictions(pairs(), 3).unwrap();
        assert!((m.precision(1).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall(1).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.precision(2).unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.recall(2).unwrap() - 0.5).abs() < 1e-12);
        assert!((m.precision(3).unwrap() - 1.0).abs() < 1e-12);
        assert!((m.accuracy() - 5.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        // Class 3 is never predicted nor present
        let m = ConfusionMatrix::from_predictions(vec![(1, 1), (2, 1)], 3).unwrap();
        assert_eq!(m.precision(3).unwrap(), 0.0);
        assert_eq!(m.recall(3).unwrap(), 0.0);
        assert_eq!(m.f1_score(3).unwrap(), 0.0);
        assert_eq!(m.precision(2).unwrap(), 0.0);
        assert!(!m.macro_f1().unwrap().is_nan());

        let empty = ConfusionMatrix::new(2).unwrap();
        assert_eq!(empty.accuracy(), 0.0);
    }

    #[test]
    fn test_macro_f1_is_exact_mean() {
        let m = ConfusionMatrix::from_predictions(pairs(), 3).unwrap();
        let per_class: Vec<f64> = (1..=3).map(|c| m.f1_score(c).unwrap()).collect();
        let expected = per_class.iter().sum::<f64>() / 3.0;
        assert_eq!(m.macro_f1().unwrap(), expected);
        assert_eq!(m.report().unwrap().macro_f1, expected);
    }

    #[test]
    fn test_one_vs_rest_matches_matrix() {
        let m = ConfusionMatrix::from_predictions(pairs(), 3).unwrap();
        for class in 1..=3 {
            let ovr = OneVsRest::from_pairs(pairs(), class);
            assert_eq!(ovr.precision(), m.precision(class).unwrap());
            assert_eq!(ovr.recall(), m.recall(class).unwrap());
            assert_eq!(ovr.f1_score(), m.f1_score(class).unwrap());
        }
    }

    #[test]
    fn test_report_supports_match_row_sums() {
        let report = ConfusionMatrix::from_predictions(pairs(), 3).unwrap().report().unwrap();
        let supports: Vec<usize> = report.per_class.iter().map(|c| c.support).collect();
        assert_eq!(supports, vec![3, 2, 3]);
        assert_eq!(report.n_samples, 8);
    }
}
