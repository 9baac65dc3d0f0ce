//! CSV export of datasets through polars

use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::data::{common_dimension, Sample};
use crate::error::{Result, ShapeClassError};

/// One `f{j}` column per feature, one row per sample
pub fn features_frame(samples: &[Sample]) -> Result<DataFrame> {
    let dimension = common_dimension(samples)?
        .ok_or_else(|| ShapeClassError::EmptyInput("no samples to export".to_string()))?;

    let columns: Vec<Column> = (0..dimension)
        .map(|j| {
            let values: Vec<f32> = samples.iter().map(|s| s.features()[j]).collect();
            Column::new(format!("f{}", j).into(), values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Single `label` column, one row per sample
pub fn labels_frame(samples: &[Sample]) -> Result<DataFrame> {
    let labels: Vec<u32> = samples.iter().map(Sample::label).collect();
    Ok(DataFrame::new(vec![Column::new("label".into(), labels)])?)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    info!(path = %path.display(), rows = df.height(), "CSV written");
    Ok(())
}

pub fn export_features_csv(samples: &[Sample], path: impl AsRef<Path>) -> Result<()> {
    let mut df = features_frame(samples)?;
    write_csv(&mut df, path.as_ref())
}

pub fn export_labels_csv(samples: &[Sample], path: impl AsRef<Path>) -> Result<()> {
    let mut df = labels_frame(samples)?;
    write_csv(&mut df, path.as_ref())
}
