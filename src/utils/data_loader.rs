//! Descriptor file loading
//!
//! BDshape stores one file per sample, named `S{class:02}N{index:03}{ext}`,
//! with one feature value per line. The extension names the descriptor that
//! produced the file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::data::{common_dimension, Label, Sample, DEFAULT_NUM_CLASSES};
use crate::error::{Result, ShapeClassError};

/// Samples per class in the BDshape reference dataset
pub const DEFAULT_SAMPLES_PER_CLASS: usize = 11;

/// Shape descriptor that produced a feature file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Descriptor {
    E34,
    F0,
    Gfd,
    Sa,
}

impl Descriptor {
    pub const ALL: [Descriptor; 4] = [Descriptor::E34, Descriptor::F0, Descriptor::Gfd, Descriptor::Sa];

    /// File extension, leading dot included
    pub fn extension(self) -> &'static str {
        match self {
            Descriptor::E34 => ".e34",
            Descriptor::F0 => ".f0",
            Descriptor::Gfd => ".gfd",
            Descriptor::Sa => ".sa",
        }
    }

    /// Directory holding the descriptor's files under the dataset root
    pub fn directory(self) -> &'static str {
        match self {
            Descriptor::E34 => "E34",
            Descriptor::F0 => "F0",
            Descriptor::Gfd => "GFD",
            Descriptor::Sa => "SA",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|d| d.extension()[1..].eq_ignore_ascii_case(extension))
    }

    /// Guess the descriptor from a feature-vector length. Lengths other than
    /// 16, 100 and 90 are taken to be F0.
    pub fn from_feature_count(count: usize) -> Self {
        match count {
            16 => Descriptor::E34,
            100 => Descriptor::Gfd,
            90 => Descriptor::Sa,
            _ => Descriptor::F0,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory())
    }
}

/// Reader for a directory of per-sample descriptor files
#[derive(Debug, Clone)]
pub struct DataReader {
    directory: PathBuf,
    extension: String,
    n_classes: usize,
    samples_per_class: usize,
}

impl DataReader {
    pub fn new(directory: impl AsRef<Path>, extension: impl Into<String>) -> Self {
        let mut extension = extension.into();
        if !extension.is_empty() && !extension.starts_with('.') {
            extension.insert(0, '.');
        }
        Self {
            directory: directory.as_ref().to_path_buf(),
            extension,
            n_classes: DEFAULT_NUM_CLASSES,
            samples_per_class: DEFAULT_SAMPLES_PER_CLASS,
        }
    }

    /// Reader for `root/<descriptor dir>` with the descriptor's extension
    pub fn for_descriptor(root: impl AsRef<Path>, descriptor: Descriptor) -> Self {
        Self::new(root.as_ref().join(descriptor.directory()), descriptor.extension())
    }

    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn with_samples_per_class(mut self, samples_per_class: usize) -> Self {
        self.samples_per_class = samples_per_class;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn descriptor(&self) -> Option<Descriptor> {
        Descriptor::from_extension(&self.extension)
    }

    /// Path of sample `index` of class `class`, both 1-based
    pub fn sample_path(&self, class: Label, index: usize) -> PathBuf {
        self.directory
            .join(format!("S{:02}N{:03}{}", class, index, self.extension))
    }

    /// Read one feature file: one value per non-empty line
    pub fn read_features(path: &Path) -> Result<Vec<f32>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut features = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let value = line.trim();
            if value.is_empty() {
                continue;
            }
            let parsed = value.parse::<f32>().map_err(|e| {
                ShapeClassError::DataError(format!(
                    "{}:{}: cannot parse '{}': {}",
                    path.display(),
                    line_no + 1,
                    value,
                    e
                ))
            })?;
            features.push(parsed);
        }
        Ok(features)
    }

    /// Read every sample, class by class, in index order
    pub fn read_data_set(&self) -> Result<Vec<Sample>> {
        let start = Instant::now();
        let mut samples = Vec::with_capacity(self.n_classes * self.samples_per_class);

        for class in 1..=self.n_classes as Label {
            for index in 1..=self.samples_per_class {
                let path = self.sample_path(class, index);
                let features = Self::read_features(&path)?;
                debug!(path = %path.display(), len = features.len(), "Read sample");
                samples.push(Sample::new(features, class));
            }
        }

        common_dimension(&samples)?;
        info!(
            directory = %self.directory.display(),
            samples = samples.len(),
            secs = start.elapsed().as_secs_f64(),
            "Dataset loaded"
        );
        Ok(samples)
    }
}

/// Shape of a loaded dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_samples: usize,
    pub dimension: usize,
    pub descriptor: Descriptor,
    pub class_counts: BTreeMap<Label, usize>,
}

impl DatasetSummary {
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let dimension = common_dimension(samples)?
            .ok_or_else(|| ShapeClassError::EmptyInput("cannot summarize an empty dataset".to_string()))?;

        let mut class_counts = BTreeMap::new();
        for sample in samples {
            *class_counts.entry(sample.label()).or_insert(0) += 1;
        }

        Ok(Self {
            n_samples: samples.len(),
            dimension,
            descriptor: Descriptor::from_feature_count(dimension),
            class_counts,
        })
    }
}
