//! K-Means clustering engine
//!
//! Lloyd iterations over a borrowed dataset with random or k-means++ seeding.
//! Clusters are kept in a vector and refer to their members by index into the
//! dataset; a cluster's identity is its position in that vector.
//!
//! Convergence is exact: the run stops once no cluster center moved during an
//! update. Floating point oscillation between two states can therefore keep
//! the loop alive, and only `max_iterations` bounds it.

use ndarray::{Array1, ArrayView1};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::distance::{check_order, minkowski, nearest, EUCLIDEAN};
use crate::data::{common_dimension, Centroid, Sample};
use crate::error::{Result, ShapeClassError};

/// Initial centroid selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seeding {
    /// First `k` distinct samples of a shuffled copy of the dataset
    Random,
    /// Distance-weighted sampling, always Euclidean regardless of `p`
    #[default]
    KMeansPlusPlus,
}

/// K-Means configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub seeding: Seeding,
    pub max_iterations: usize,
    /// Minkowski order used for assignment
    pub p: u32,
    pub random_state: Option<u64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 9,
            seeding: Seeding::KMeansPlusPlus,
            max_iterations: 100,
            p: 2,
            random_state: None,
        }
    }
}

impl KMeansConfig {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Default::default()
        }
    }

    pub fn with_seeding(mut self, seeding: Seeding) -> Self {
        self.seeding = seeding;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
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

/// Lifecycle of a [`KMeansEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusteringState {
    Uninitialized,
    Seeded,
    Converged { iterations: usize },
    MaxIterationsReached { iterations: usize },
}

/// Summary of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringOutcome {
    pub iterations: usize,
    pub converged: bool,
}

/// A cluster: its centroid and the indices of its current members
#[derive(Debug, Clone)]
pub struct Cluster {
    centroid: Centroid,
    members: Vec<usize>,
    center_point: Array1<f32>,
    previous_center_point: Array1<f32>,
}

impl Cluster {
    fn new(coordinates: Array1<f32>) -> Self {
        Self {
            center_point: coordinates.clone(),
            previous_center_point: coordinates.clone(),
            centroid: Centroid::new(coordinates),
            members: Vec::new(),
        }
    }

    pub fn centroid(&self) -> &Centroid {
        &self.centroid
    }

    pub(crate) fn centroid_mut(&mut self) -> &mut Centroid {
        &mut self.centroid
    }

    /// Dataset indices assigned during the last assignment pass
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn center_point(&self) -> ArrayView1<'_, f32> {
        self.center_point.view()
    }

    pub fn previous_center_point(&self) -> ArrayView1<'_, f32> {
        self.previous_center_point.view()
    }

    /// Move the center to the mean of the members. An empty cluster keeps
    /// its center.
    fn recompute_center(&mut self, data_set: &[Sample]) {
        self.previous_center_point = self.center_point.clone();
        if self.members.is_empty() {
            return;
        }

        let mut sum = Array1::<f32>::zeros(self.center_point.len());
        for &idx in &self.members {
            sum += &data_set[idx].features();
        }
        let count = self.members.len() as f32;
        sum.mapv_inplace(|v| v / count);

        self.center_point = sum;
        self.centroid = Centroid::new(self.center_point.clone());
    }

    fn has_not_changed(&self) -> bool {
        self.center_point == self.previous_center_point
    }
}

/// K-Means clustering over a borrowed dataset
#[derive(Debug, Clone)]
pub struct KMeansEngine<'a> {
    config: KMeansConfig,
    data_set: &'a [Sample],
    rng: ChaCha8Rng,
    clusters: Vec<Cluster>,
    /// Cluster of each dataset sample after the last assignment
    assignments: Vec<usize>,
    state: ClusteringState,
}

impl<'a> KMeansEngine<'a> {
    pub fn new(data_set: &'a [Sample], config: KMeansConfig) -> Self {
        let rng = match config.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            data_set,
            rng,
            clusters: Vec::new(),
            assignments: Vec::new(),
            state: ClusteringState::Uninitialized,
        }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    pub fn data_set(&self) -> &'a [Sample] {
        self.data_set
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub(crate) fn clusters_mut(&mut self) -> &mut [Cluster] {
        &mut self.clusters
    }

    pub fn state(&self) -> ClusteringState {
        self.state
    }

    /// Samples currently assigned to `cluster`
    pub fn members(&self, cluster: usize) -> impl Iterator<Item = &'a Sample> + '_ {
        let data_set = self.data_set;
        self.clusters
            .get(cluster)
            .into_iter()
            .flat_map(move |c| c.members.iter().map(move |&idx| &data_set[idx]))
    }

    /// Index of the cluster holding dataset sample `sample_index`
    pub fn cluster_of(&self, sample_index: usize) -> Option<usize> {
        self.assignments.get(sample_index).copied()
    }

    /// Cluster index per dataset sample; empty until the first assignment
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    fn validate(&self) -> Result<()> {
        let k = self.config.n_clusters;
        if self.data_set.is_empty() {
            return Err(ShapeClassError::EmptyInput("cannot cluster an empty dataset".to_string()));
        }
        if k == 0 {
            return Err(ShapeClassError::invalid_parameter("k", k, "at least one cluster is required"));
        }
        if self.config.max_iterations == 0 {
            return Err(ShapeClassError::invalid_parameter(
                "max_iterations",
                self.config.max_iterations,
                "at least one iteration is required",
            ));
        }
        check_order(self.config.p)?;
        common_dimension(self.data_set)?;

        let distinct = self
            .data_set
            .iter()
            .map(point_key)
            .collect::<HashSet<_>>()
            .len();
        if k > distinct {
            return Err(ShapeClassError::invalid_parameter(
                "k",
                k,
                format!("exceeds the number of distinct points ({})", distinct),
            ));
        }
        Ok(())
    }

    /// Choose the initial centroids
    pub fn seed(&mut self) -> Result<()> {
        self.validate()?;
        let centers = match self.config.seeding {
            Seeding::Random => self.random_centers(),
            Seeding::KMeansPlusPlus => self.plus_plus_centers()?,
        };
        self.clusters = centers.into_iter().map(Cluster::new).collect();
        self.assignments.clear();
        self.state = ClusteringState::Seeded;
        debug!(k = self.clusters.len(), seeding = ?self.config.seeding, "Clusters seeded");
        Ok(())
    }

    fn random_centers(&mut self) -> Vec<Array1<f32>> {
        let mut order: Vec<usize> = (0..self.data_set.len()).collect();
        order.shuffle(&mut self.rng);

        let mut seen = HashSet::new();
        order
            .into_iter()
            .filter(|&idx| seen.insert(point_key(&self.data_set[idx])))
            .take(self.config.n_clusters)
            .map(|idx| self.data_set[idx].features().to_owned())
            .collect()
    }

    fn plus_plus_centers(&mut self) -> Result<Vec<Array1<f32>>> {
        let data_set = self.data_set;
        let first = self.rng.gen_range(0..data_set.len());
        let mut centers = vec![data_set[first].features().to_owned()];

        while centers.len() < self.config.n_clusters {
            let distances = data_set
                .iter()
                .map(|sample| {
                    centers.iter().try_fold(f64::MAX, |min, center| {
                        minkowski(sample.features(), center.view(), EUCLIDEAN).map(|d| min.min(d as f64))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            let total: f64 = distances.iter().sum();
            if total <= 0.0 {
                return Err(ShapeClassError::invalid_parameter(
                    "k",
                    self.config.n_clusters,
                    "not enough distinct points for k-means++ seeding",
                ));
            }

            let draw = self.rng.gen::<f64>() * total;
            let chosen = weighted_choice(&distances, draw).ok_or_else(|| {
                ShapeClassError::Consistency("k-means++ draw selected no sample".to_string())
            })?;
            centers.push(data_set[chosen].features().to_owned());
        }
        Ok(centers)
    }

    /// Put every sample in the cluster with the nearest centroid
    fn assign(&mut self) -> Result<()> {
        let p = self.config.p;
        let mut assignments = Vec::with_capacity(self.data_set.len());
        for sample in self.data_set {
            let centroids = self.clusters.iter().map(|c| c.centroid.coordinates());
            let idx = nearest(sample.features(), centroids, p)?
                .ok_or_else(|| ShapeClassError::Consistency("no cluster to assign to".to_string()))?;
            assignments.push(idx);
        }

        for cluster in &mut self.clusters {
            cluster.members.clear();
        }
        for (sample_idx, &cluster_idx) in assignments.iter().enumerate() {
            self.clusters[cluster_idx].members.push(sample_idx);
        }
        self.assignments = assignments;
        Ok(())
    }

    fn update(&mut self) {
        let data_set = self.data_set;
        for cluster in &mut self.clusters {
            cluster.recompute_center(data_set);
        }
    }

    fn all_converged(&self) -> bool {
        self.clusters.iter().all(Cluster::has_not_changed)
    }

    /// Seed, then alternate assignment and update until no center moves or
    /// `max_iterations` passes have run.
    pub fn run(&mut self) -> Result<ClusteringOutcome> {
        self.seed()?;
        let max_iterations = self.config.max_iterations;
        let mut iterations = 0;

        loop {
            self.assign()?;
            self.update();
            iterations += 1;

            if tracing::enabled!(tracing::Level::DEBUG) {
                let sizes: Vec<usize> = self.clusters.iter().map(Cluster::len).collect();
                debug!(iteration = iterations, ?sizes, "K-Means iteration");
            }

            if self.all_converged() {
                self.state = ClusteringState::Converged { iterations };
                info!(iterations, k = self.clusters.len(), "K-Means converged");
                return Ok(ClusteringOutcome { iterations, converged: true });
            }
            if iterations >= max_iterations {
                self.state = ClusteringState::MaxIterationsReached { iterations };
                warn!(iterations, "K-Means stopped at the iteration cap without converging");
                return Ok(ClusteringOutcome { iterations, converged: false });
            }
        }
    }

    /// Sum over samples of the distance (order `p`) to their cluster centroid
    pub fn inertia(&self) -> Result<f64> {
        let mut total = 0.0;
        for cluster in &self.clusters {
            for &idx in &cluster.members {
                total += minkowski(self.data_set[idx].features(), cluster.centroid.coordinates(), self.config.p)? as f64;
            }
        }
        Ok(total)
    }
}

/// Bit pattern of a feature vector, with `-0.0` folded onto `0.0`
fn point_key(sample: &Sample) -> Vec<u32> {
    sample.features().iter().map(|v| (v + 0.0).to_bits()).collect()
}

/// Walk `weights` accumulating them and return the first index with a
/// positive weight whose running sum reaches `draw`. Rounding can leave the
/// final sum just under `draw`; the last positive weight is taken then.
pub(crate) fn weighted_choice(weights: &[f64], draw: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (idx, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = Some(idx);
        if cumulative >= draw {
            return Some(idx);
        }
    }
    last_positive
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_points() -> Vec<Sample> {
        vec![
            Sample::new(vec![0.0, 0.0], 1),
            Sample::new(vec![0.0, 1.0], 1),
            Sample::new(vec![10.0, 0.0], 2),
            Sample::new(vec![10.0, 1.0], 2),
        ]
    }

    fn three_blobs() -> Vec<Sample> {
        let centers = [(0.0f32, 0.0f32), (20.0, 0.0), (0.0, 20.0)];
        let mut data = Vec::new();
        for (label, &(cx, cy)) in centers.iter().enumerate() {
            for i in 0..5 {
                let dx = (i % 3) as f32 * 0.5;
                let dy = (i / 3) as f32 * 0.5;
                data.push(Sample::new(vec![cx + dx, cy + dy], label as u32 + 1));
            }
        }
        data
    }

    fn is_label_pure(engine: &KMeansEngine<'_>, cluster: usize) -> bool {
        let labels: Vec<u32> = engine.members(cluster).map(Sample::label).collect();
        labels.windows(2).all(|w| w[0] == w[1])
    }

    #[test]
    fn test_kmeans_basic() {
        let data = three_blobs();
        let mut engine = KMeansEngine::new(&data, KMeansConfig::new(3).with_random_state(42));
        let outcome = engine.run().unwrap();
        assert_eq!(engine.clusters().len(), 3);
        assert!(outcome.iterations >= 1);
        assert!(matches!(engine.state(), ClusteringState::Converged { .. } | ClusteringState::MaxIterationsReached { .. }));
    }

    #[test]
    fn test_every_sample_assigned_once() {
        let data = three_blobs();
        for seeding in [Seeding::Random, Seeding::KMeansPlusPlus] {
            for seed in 0..10 {
                let config = KMeansConfig::new(3).with_seeding(seeding).with_random_state(seed);
                let mut engine = KMeansEngine::new(&data, config);
                engine.run().unwrap();

                let total: usize = engine.clusters().iter().map(Cluster::len).sum();
                assert_eq!(total, data.len());
                for idx in 0..data.len() {
                    let owners = engine.clusters().iter().filter(|c| c.members().contains(&idx)).count();
                    assert_eq!(owners, 1);
                }
            }
        }
    }

    #[test]
    fn test_four_points_mostly_split_by_label() {
        // A pair of seeds from the same side leads to a stable mixed split, so
        // only most seeds are expected to find the label-pure partition.
        let data = four_points();
        let mut pure_runs = 0;
        for seed in 0..50 {
            let mut engine = KMeansEngine::new(&data, KMeansConfig::new(2).with_random_state(seed));
            let outcome = engine.run().unwrap();
            assert!(outcome.converged);
            if (0..2).all(|c| engine.clusters()[c].len() == 2 && is_label_pure(&engine, c)) {
                pure_runs += 1;
            }
        }
        assert!(pure_runs >= 40, "only {} of 50 runs found the label split", pure_runs);
    }

    #[test]
    fn test_cluster_of_matches_members() {
        let data = three_blobs();
        let mut engine = KMeansEngine::new(&data, KMeansConfig::new(3).with_random_state(11));
        assert_eq!(engine.cluster_of(0), None);
        engine.run().unwrap();

        assert_eq!(engine.assignments().len(), data.len());
        for (c, cluster) in engine.clusters().iter().enumerate() {
            for &idx in cluster.members() {
                assert_eq!(engine.cluster_of(idx), Some(c));
            }
        }
        assert_eq!(engine.cluster_of(data.len()), None);

        engine.seed().unwrap();
        assert_eq!(engine.cluster_of(0), None);
    }

    #[test]
    fn test_converged_centers_are_means() {
        let data = four_points();
        let mut engine = KMeansEngine::new(&data, KMeansConfig::new(2).with_random_state(3));
        engine.run().unwrap();
        for cluster in engine.clusters() {
            assert_eq!(cluster.center_point(), cluster.previous_center_point());
            assert_eq!(cluster.centroid().coordinates(), cluster.center_point());
        }
    }

    #[test]
    fn test_single_cluster_is_the_mean() {
        let data = four_points();
        let mut engine = KMeansEngine::new(&data, KMeansConfig::new(1).with_random_state(0));
        let outcome = engine.run().unwrap();
        assert!(outcome.converged);
        let center = engine.clusters()[0].center_point().to_vec();
        assert_eq!(center, vec![5.0, 0.5]);
        assert_eq!(engine.cluster_of(3), Some(0));
    }

    #[test]
    fn test_empty_cluster_keeps_its_centroid() {
        let data = vec![Sample::new(vec![0.0], 1), Sample::new(vec![1.0], 1)];
        let mut engine = KMeansEngine::new(&data, KMeansConfig::new(2).with_random_state(0));
        engine.seed().unwrap();
        // Force one cluster far away so it loses every member
        engine.clusters = vec![Cluster::new(Array1::from_vec(vec![0.5])), Cluster::new(Array1::from_vec(vec![100.0]))];
        engine.assign().unwrap();
        engine.update();
        assert!(engine.clusters()[1].is_empty());
        assert_eq!(engine.clusters()[1].center_point().to_vec(), vec![100.0]);
        assert!(engine.clusters()[1].center_point().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_iteration_cap() {
        let data = three_blobs();
        let config = KMeansConfig::new(3)
            .with_seeding(Seeding::Random)
            .with_max_iterations(1)
            .with_random_state(9);
        let mut engine = KMeansEngine::new(&data, config);
        let outcome = engine.run().unwrap();
        assert_eq!(outcome.iterations, 1);
        if !outcome.converged {
            assert_eq!(engine.state(), ClusteringState::MaxIterationsReached { iterations: 1 });
        }
    }

    #[test]
    fn test_invalid_configurations() {
        let data = four_points();
        let empty: Vec<Sample> = Vec::new();
        assert!(matches!(
            KMeansEngine::new(&empty, KMeansConfig::new(2)).run(),
            Err(ShapeClassError::EmptyInput(_))
        ));
        assert!(KMeansEngine::new(&data, KMeansConfig::new(0)).run().is_err());
        assert!(KMeansEngine::new(&data, KMeansConfig::new(5)).run().is_err());
        assert!(KMeansEngine::new(&data, KMeansConfig::new(2).with_p(0)).run().is_err());
        assert!(KMeansEngine::new(&data, KMeansConfig::new(2).with_max_iterations(0)).run().is_err());

        let duplicated = vec![Sample::new(vec![1.0], 1), Sample::new(vec![1.0], 1), Sample::new(vec![2.0], 2)];
        let err = KMeansEngine::new(&duplicated, KMeansConfig::new(3)).run().unwrap_err();
        assert!(matches!(err, ShapeClassError::InvalidParameter { .. }));

        let ragged = vec![Sample::new(vec![1.0], 1), Sample::new(vec![1.0, 2.0], 1)];
        assert!(matches!(
            KMeansEngine::new(&ragged, KMeansConfig::new(1)).run(),
            Err(ShapeClassError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_random_seeding_picks_distinct_points() {
        let data = vec![
            Sample::new(vec![1.0], 1),
            Sample::new(vec![1.0], 1),
            Sample::new(vec![1.0], 1),
            Sample::new(vec![5.0], 2),
        ];
        for seed in 0..20 {
            let config = KMeansConfig::new(2).with_seeding(Seeding::Random).with_random_state(seed);
            let mut engine = KMeansEngine::new(&data, config);
            engine.seed().unwrap();
            let a = engine.clusters()[0].centroid().coordinates().to_vec();
            let b = engine.clusters()[1].centroid().coordinates().to_vec();
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_weighted_choice_walks_cumulative_sum() {
        let weights = [0.0, 1.0, 2.0, 4.0];
        assert_eq!(weighted_choice(&weights, 0.0), Some(1));
        assert_eq!(weighted_choice(&weights, 1.0), Some(1));
        assert_eq!(weighted_choice(&weights, 1.5), Some(2));
        assert_eq!(weighted_choice(&weights, 6.9), Some(3));
        assert_eq!(weighted_choice(&weights, 7.5), Some(3));
        assert_eq!(weighted_choice(&[0.0, 0.0], 0.0), None);
    }

    #[test]
    fn test_plus_plus_frequency_grows_with_distance() {
        let weights = [0.0, 1.0, 2.0, 4.0];
        let total: f64 = weights.iter().sum();
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let mut counts = [0usize; 4];
        for _ in 0..20_000 {
            let draw = rng.gen::<f64>() * total;
            counts[weighted_choice(&weights, draw).unwrap()] += 1;
        }
        assert_eq!(counts[0], 0);
        assert!(counts[1] < counts[2] && counts[2] < counts[3], "{:?}", counts);
    }

    #[test]
    fn test_plus_plus_seeding_prefers_far_points() {
        // One far outlier: with the first centroid in the dense group, the
        // outlier should be chosen as second centroid in most runs.
        let mut data: Vec<Sample> = (0..10).map(|i| Sample::new(vec![i as f32 * 0.01], 1)).collect();
        data.push(Sample::new(vec![100.0], 2));

        let mut picked_outlier = 0;
        let mut runs = 0;
        for seed in 0..200 {
            let mut engine = KMeansEngine::new(&data, KMeansConfig::new(2).with_random_state(seed));
            engine.seed().unwrap();
            let first = engine.clusters()[0].centroid().coordinates()[0];
            if first < 1.0 {
                runs += 1;
                if engine.clusters()[1].centroid().coordinates()[0] == 100.0 {
                    picked_outlier += 1;
                }
            }
        }
        assert!(runs > 0);
        assert!(picked_outlier * 10 >= runs * 9, "{} of {}", picked_outlier, runs);
    }

    #[test]
    fn test_inertia_is_zero_when_every_point_is_a_centroid() {
        let data = four_points();
        let mut engine = KMeansEngine::new(&data, KMeansConfig::new(4).with_random_state(1));
        engine.run().unwrap();
        assert_eq!(engine.inertia().unwrap(), 0.0);
    }
}
