//! Clustering used as a classifier
//!
//! Every cluster takes the plurality ground-truth label of its members, and a
//! sample is predicted as the label of the cluster that holds it. Because the
//! outcome depends on the seeding, [`select_best_model`] runs several
//! independent restarts and keeps the one with the best macro-F1.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::kmeans::{ClusteringOutcome, KMeansConfig, KMeansEngine};
use crate::data::{Centroid, Label, Sample, DEFAULT_NUM_CLASSES, UNLABELED};
use crate::error::{Result, ShapeClassError};
use crate::evaluation::{ConfusionMatrix, EvaluationReport};

/// Upper bound on the number of restarts accepted by model selection
pub const MAX_RESTARTS: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════
//  Classifier
// ═══════════════════════════════════════════════════════════════════════════

/// K-Means engine plus cluster labeling and scoring
#[derive(Debug, Clone)]
pub struct KMeansClassifier<'a> {
    engine: KMeansEngine<'a>,
    num_classes: usize,
}

impl<'a> KMeansClassifier<'a> {
    pub fn new(data_set: &'a [Sample], config: KMeansConfig) -> Self {
        Self {
            engine: KMeansEngine::new(data_set, config),
            num_classes: DEFAULT_NUM_CLASSES,
        }
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn engine(&self) -> &KMeansEngine<'a> {
        &self.engine
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Cluster the dataset, then label the clusters
    pub fn fit(&mut self) -> Result<ClusteringOutcome> {
        let outcome = self.engine.run()?;
        self.assign_cluster_labels();
        Ok(outcome)
    }

    /// Give each cluster the most frequent label among its members. Ties go
    /// to the label met first in member order; an empty cluster gets
    /// [`UNLABELED`].
    pub fn assign_cluster_labels(&mut self) {
        let data_set = self.engine.data_set();
        for cluster in self.engine.clusters_mut() {
            let label = plurality_label(cluster.members().iter().map(|&idx| data_set[idx].label()));
            cluster.centroid_mut().set_label(label.unwrap_or(UNLABELED));
        }
    }

    /// Label of each cluster, in cluster order
    pub fn cluster_labels(&self) -> Vec<Option<Label>> {
        self.engine
            .clusters()
            .iter()
            .map(|c| c.centroid().label())
            .collect()
    }

    /// `(actual, predicted)` for every sample in dataset order
    pub fn predictions(&self) -> Result<Vec<(Label, Label)>> {
        let data_set = self.engine.data_set();
        let mut owner: Vec<Option<usize>> = vec![None; data_set.len()];

        for (cluster_idx, cluster) in self.engine.clusters().iter().enumerate() {
            for &sample_idx in cluster.members() {
                let slot = owner.get_mut(sample_idx).ok_or_else(|| {
                    ShapeClassError::Consistency(format!("cluster {} holds unknown sample {}", cluster_idx, sample_idx))
                })?;
                if let Some(previous) = slot.replace(cluster_idx) {
                    return Err(ShapeClassError::Consistency(format!(
                        "sample {} belongs to clusters {} and {}",
                        sample_idx, previous, cluster_idx
                    )));
                }
            }
        }

        owner
            .iter()
            .enumerate()
            .map(|(sample_idx, cluster_idx)| {
                let cluster_idx = cluster_idx.ok_or_else(|| {
                    ShapeClassError::Consistency(format!("sample {} is not in any cluster", sample_idx))
                })?;
                let predicted = self.engine.clusters()[cluster_idx]
                    .centroid()
                    .label()
                    .ok_or_else(|| {
                        ShapeClassError::Consistency(format!("cluster {} has no label", cluster_idx))
                    })?;
                Ok((data_set[sample_idx].label(), predicted))
            })
            .collect()
    }

    pub fn compute_confusion_matrix(&self) -> Result<ConfusionMatrix> {
        ConfusionMatrix::from_predictions(self.predictions()?, self.num_classes)
    }

    /// Per-class precision, recall, F1 and the macro-F1 of the labeled clustering
    pub fn compute_evaluation_scores(&self) -> Result<EvaluationReport> {
        self.compute_confusion_matrix()?.report()
    }

    /// Labeled centroids, in cluster order
    pub fn centroids(&self) -> Vec<Centroid> {
        self.engine
            .clusters()
            .iter()
            .map(|c| c.centroid().clone())
            .collect()
    }
}

fn plurality_label<I: IntoIterator<Item = Label>>(labels: I) -> Option<Label> {
    let mut counts: Vec<(Label, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(Label, usize)> = None;
    for &(label, count) in &counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Model selection
// ═══════════════════════════════════════════════════════════════════════════

/// Best of several independently seeded clustering runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    /// Position of the winning run in restart order
    pub best_restart: usize,
    /// Seed the winning run was built with
    pub seed: u64,
    pub outcome: ClusteringOutcome,
    pub report: EvaluationReport,
    pub centroids: Vec<Centroid>,
    /// Macro-F1 of every run, in restart order
    pub scores: Vec<f64>,
}

impl ModelSelection {
    pub fn macro_f1(&self) -> f64 {
        self.report.macro_f1
    }
}

struct RestartRun {
    outcome: ClusteringOutcome,
    report: EvaluationReport,
    centroids: Vec<Centroid>,
}

fn run_restart(data_set: &[Sample], config: KMeansConfig, num_classes: usize) -> Result<RestartRun> {
    let mut classifier = KMeansClassifier::new(data_set, config).with_num_classes(num_classes);
    let outcome = classifier.fit()?;
    let report = classifier.compute_evaluation_scores()?;
    Ok(RestartRun {
        outcome,
        report,
        centroids: classifier.centroids(),
    })
}

/// [`select_best_model_with_classes`] for the nine BDshape classes
pub fn select_best_model(data_set: &[Sample], config: &KMeansConfig, restarts: usize) -> Result<ModelSelection> {
    select_best_model_with_classes(data_set, config, restarts, DEFAULT_NUM_CLASSES)
}

/// Run the clustering pipeline `restarts` times and keep the run with the
/// highest macro-F1; the earliest run wins ties.
///
/// Seeds are drawn up front from `config.random_state`, so the result does not
/// depend on how rayon schedules the runs.
pub fn select_best_model_with_classes(
    data_set: &[Sample],
    config: &KMeansConfig,
    restarts: usize,
    num_classes: usize,
) -> Result<ModelSelection> {
    if restarts == 0 || restarts > MAX_RESTARTS {
        return Err(ShapeClassError::invalid_parameter(
            "restarts",
            restarts,
            format!("must be between 1 and {}", MAX_RESTARTS),
        ));
    }

    let mut master = match config.random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let seeds: Vec<u64> = (0..restarts).map(|_| master.gen()).collect();

    let runs = seeds
        .par_iter()
        .map(|&seed| {
            let mut run_config = config.clone();
            run_config.random_state = Some(seed);
            run_restart(data_set, run_config, num_classes)
        })
        .collect::<Result<Vec<RestartRun>>>()?;

    let scores: Vec<f64> = runs.iter().map(|r| r.report.macro_f1).collect();
    let mut best_restart = 0;
    for (idx, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best_restart] {
            best_restart = idx;
        }
    }
    debug!(?scores, "Restart scores");

    let seed = seeds[best_restart];
    let best = runs.into_iter().nth(best_restart).ok_or_else(|| {
        ShapeClassError::Consistency("winning restart is missing".to_string())
    })?;
    info!(
        restarts,
        best_restart,
        macro_f1 = best.report.macro_f1,
        iterations = best.outcome.iterations,
        "K-Means model selected"
    );

    Ok(ModelSelection {
        best_restart,
        seed,
        outcome: best.outcome,
        report: best.report,
        centroids: best.centroids,
        scores,
    })
}
