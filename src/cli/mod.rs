//! ShapeClass CLI Module
//!
//! Command-line interface for KNN and K-Means evaluation on BDshape
//! descriptor files.

use clap::{Args, Parser, Subcommand};
use colored::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{DatasetSplitter, Label, LabelName, Sample, DEFAULT_NUM_CLASSES};
use crate::evaluation::EvaluationReport;
use crate::optimizer::{GridPoint, GridSearch, HyperparameterResult, SearchConfig};
use crate::training::{select_best_model, KMeansConfig, KNNClassifier, KNNConfig, ModelSelection, Seeding};
use crate::utils::{export_features_csv, export_labels_csv, DataReader, DatasetSummary};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn class_name(class: Label) -> String {
    LabelName::try_from(class)
        .map(|name| name.to_string())
        .unwrap_or_else(|_| format!("class {}", class))
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "shapeclass")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "KNN and K-Means classification of BDshape shape descriptors")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON file with `knn`, `kmeans` and `search` sections. A `knn` section
    /// fixes `k` and `p` and skips the grid search
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

/// Where to read the descriptor files from
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Directory holding the `SxxNyyy` descriptor files
    #[arg(short, long)]
    pub data: PathBuf,

    /// Descriptor file extension (.e34, .f0, .gfd, .sa)
    #[arg(short, long, default_value = ".e34")]
    pub extension: String,
}

impl DatasetArgs {
    pub fn reader(&self) -> DataReader {
        DataReader::new(&self.data, self.extension.as_str())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search KNN hyperparameters and evaluate the best model on a held-out split
    Knn {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Share of samples used for training
        #[arg(long, default_value = "0.8")]
        train_ratio: f64,

        /// Seed for the split and the search
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Cluster with K-Means and evaluate the best of several restarts
    Kmeans {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Number of clusters (defaults to the configured value)
        #[arg(short, long)]
        k: Option<usize>,

        /// Independent restarts to choose from
        #[arg(long, default_value = "10")]
        restarts: usize,

        /// Seed centroids uniformly instead of with k-means++
        #[arg(long)]
        random_init: bool,

        /// Master seed for the restarts
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show dataset information
    Info {
        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Export features and labels as CSV
    Export {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
}

// ─── Configuration ─────────────────────────────────────────────────────────────

/// Settings loadable from `--config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fixed KNN parameters; `None` searches them with `search`
    pub knn: Option<KNNConfig>,
    pub kmeans: KMeansConfig,
    pub search: SearchConfig,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&text)?)
            }
            None => Ok(Self::default()),
        }
    }
}

// ─── Reports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct KnnRun {
    k: usize,
    p: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cv_score: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    grid: Vec<GridPoint>,
    test: EvaluationReport,
}

fn print_report(report: &EvaluationReport) {
    println!();
    println!("  {:<16} {}", muted("Accuracy"), format!("{:.4}", report.accuracy).white().bold());
    println!("  {:<16} {}", muted("Macro F1"), format!("{:.4}", report.macro_f1).white().bold());
    println!("  {:<16} {}", muted("Samples"), report.n_samples.to_string().white());

    println!();
    println!(
        "  {:<14} {:>10} {:>10} {:>10} {:>8}",
        muted("Class"),
        muted("Precision"),
        muted("Recall"),
        muted("F1"),
        muted("Support")
    );
    println!("  {}", dim(&"─".repeat(56)));
    for m in &report.per_class {
        println!(
            "  {:<14} {:>10.4} {:>10.4} {:>10.4} {:>8}",
            class_name(m.class),
            m.precision,
            m.recall,
            m.f1_score,
            m.support
        );
    }

    println!();
    println!("  {}", muted("Confusion matrix (rows: actual, columns: predicted)"));
    for row in &report.confusion_matrix {
        let cells: Vec<String> = row.iter().map(|c| format!("{:>3}", c)).collect();
        println!("  {}", cells.join(" "));
    }
    println!();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_knn(
    dataset: &DatasetArgs,
    train_ratio: f64,
    seed: Option<u64>,
    config: &AppConfig,
    json: bool,
) -> anyhow::Result<()> {
    let samples = dataset.reader().read_data_set()?;

    let mut splitter = DatasetSplitter::new(train_ratio);
    let mut search = config.search.clone();
    if let Some(seed) = seed {
        splitter = splitter.with_random_state(seed);
        search = search.with_random_state(seed);
    }
    let split = splitter.split(&samples)?;

    if !json {
        section("KNN");
        println!("  {:<16} {}", muted("Train"), split.train.len().to_string().white());
        println!("  {:<16} {}", muted("Test"), split.test.len().to_string().white());
        if config.knn.is_none() {
            step_run(&format!("Searching {} × {} grid", search.k_values.len(), search.p_candidates.len()));
        }
    }
    let start = Instant::now();
    let (knn_config, searched) = knn_parameters(config, search, &split.train)?;
    if !json && searched.is_some() {
        step_done(&format!("{:?}", start.elapsed()));
    }

    let classifier = KNNClassifier::new(knn_config.clone())?;
    let report = classifier.evaluate(&split.train, &split.test, DEFAULT_NUM_CLASSES)?;

    if json {
        let (cv_score, grid) = match searched {
            Some(result) => (Some(result.score), result.grid),
            None => (None, Vec::new()),
        };
        return print_json(&KnnRun {
            k: knn_config.n_neighbors,
            p: knn_config.p,
            cv_score,
            grid,
            test: report,
        });
    }

    println!();
    match searched {
        Some(result) => println!(
            "  {} k = {}, p = {} {} {:.4}",
            ok("best"),
            result.k.to_string().white().bold(),
            result.p.to_string().white().bold(),
            muted("cv accuracy:"),
            result.score
        ),
        None => println!(
            "  {} k = {}, p = {} {}",
            ok("fixed"),
            knn_config.n_neighbors.to_string().white().bold(),
            knn_config.p.to_string().white().bold(),
            muted("(from config)")
        ),
    }
    print_report(&report);
    Ok(())
}

/// KNN parameters for a run: the configured ones when `knn` is set,
/// otherwise the winner of a grid search over `train`.
fn knn_parameters(
    config: &AppConfig,
    search: SearchConfig,
    train: &[Sample],
) -> crate::Result<(KNNConfig, Option<HyperparameterResult>)> {
    if let Some(knn) = &config.knn {
        tracing::debug!(k = knn.n_neighbors, p = knn.p, "using configured KNN parameters");
        return Ok((knn.clone(), None));
    }
    let result = GridSearch::new(search).run(train)?;
    let knn = KNNConfig::default().with_k(result.k).with_p(result.p);
    Ok((knn, Some(result)))
}

pub fn cmd_kmeans(
    dataset: &DatasetArgs,
    k: Option<usize>,
    restarts: usize,
    random_init: bool,
    seed: Option<u64>,
    config: &AppConfig,
    json: bool,
) -> anyhow::Result<()> {
    let samples = dataset.reader().read_data_set()?;

    let mut kmeans = config.kmeans.clone();
    if let Some(k) = k {
        kmeans.n_clusters = k;
    }
    if random_init {
        kmeans = kmeans.with_seeding(Seeding::Random);
    }
    if let Some(seed) = seed {
        kmeans = kmeans.with_random_state(seed);
    }

    if !json {
        section("K-Means");
        step_run(&format!("Running {} restarts with k = {}", restarts, kmeans.n_clusters));
    }
    let start = Instant::now();
    let selection: ModelSelection = select_best_model(&samples, &kmeans, restarts)?;

    if json {
        return print_json(&selection);
    }
    step_done(&format!("{:?}", start.elapsed()));

    let converged = if selection.outcome.converged {
        ok("converged")
    } else {
        "iteration cap".yellow()
    };
    println!();
    println!(
        "  {} restart {} {} after {} iterations",
        ok("best"),
        selection.best_restart.to_string().white().bold(),
        converged,
        selection.outcome.iterations
    );
    let scores: Vec<String> = selection.scores.iter().map(|s| format!("{:.3}", s)).collect();
    println!("  {:<16} {}", muted("Restart F1"), scores.join(" "));
    print_report(&selection.report);
    Ok(())
}

pub fn cmd_info(dataset: &DatasetArgs, json: bool) -> anyhow::Result<()> {
    let samples = dataset.reader().read_data_set()?;
    let summary = DatasetSummary::from_samples(&samples)?;

    if json {
        return print_json(&summary);
    }

    section("Dataset");
    println!("  {:<16} {}", muted("Directory"), dataset.data.display().to_string().white());
    println!("  {:<16} {}", muted("Descriptor"), summary.descriptor.to_string().white());
    println!("  {:<16} {}", muted("Samples"), summary.n_samples.to_string().white());
    println!("  {:<16} {}", muted("Features"), summary.dimension.to_string().white());
    println!();
    for (class, count) in &summary.class_counts {
        println!("  {:<16} {}", muted(&class_name(*class)), count);
    }
    println!();
    Ok(())
}

pub fn cmd_export(dataset: &DatasetArgs, output: &Path) -> anyhow::Result<()> {
    section("Export");

    step_run("Loading data");
    let samples = dataset.reader().read_data_set()?;
    step_done(&format!("{} samples", samples.len()));

    std::fs::create_dir_all(output)?;
    let features = output.join("features.csv");
    let labels = output.join("labels.csv");

    step_run(&format!("Saving → {}", features.display()));
    export_features_csv(&samples, &features)?;
    step_done("");

    step_run(&format!("Saving → {}", labels.display()));
    export_labels_csv(&samples, &labels)?;
    step_done("");

    println!();
    Ok(())
}
