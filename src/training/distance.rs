//! Minkowski distance, the single metric shared by every classifier
//!
//! All arithmetic is done in `f32` so that tie-breaks between equal
//! distances are reproducible within a run.

use ndarray::ArrayView1;

use crate::error::{Result, ShapeClassError};

/// Order of the Manhattan distance
pub const MANHATTAN: u32 = 1;
/// Order of the Euclidean distance
pub const EUCLIDEAN: u32 = 2;

/// Fail with `InvalidParameter` unless `p >= 1`
pub fn check_order(p: u32) -> Result<()> {
    if p < 1 {
        return Err(ShapeClassError::invalid_parameter(
            "p",
            p,
            "Minkowski order must be >= 1",
        ));
    }
    Ok(())
}

/// Minkowski distance of order `p`: `(Σ|a_i - b_i|^p)^(1/p)`.
///
/// For `p > 1` the differences are scaled by the largest one before raising
/// them to `p`, so the sum stays in `[1, n]` and cannot overflow. Very large
/// orders tend to the largest difference.
pub fn minkowski(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>, p: u32) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ShapeClassError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    check_order(p)?;

    let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
    if p == MANHATTAN {
        return Ok(diffs.sum());
    }

    let largest = diffs.clone().fold(0.0f32, f32::max);
    if largest == 0.0 {
        return Ok(0.0);
    }

    let sum: f32 = match i32::try_from(p) {
        Ok(exp) => diffs.map(|d| (d / largest).powi(exp)).sum(),
        Err(_) => diffs.map(|d| (d / largest).powf(p as f32)).sum(),
    };
    Ok(largest * sum.powf(1.0 / p as f32))
}

/// Index of the candidate closest to `point`; the first one wins on ties.
pub fn nearest<'a, I>(point: ArrayView1<'_, f32>, candidates: I, p: u32) -> Result<Option<usize>>
where
    I: IntoIterator<Item = ArrayView1<'a, f32>>,
{
    let mut best: Option<(usize, f32)> = None;
    for (idx, candidate) in candidates.into_iter().enumerate() {
        let dist = minkowski(point, candidate, p)?;
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((idx, dist)),
        }
    }
    Ok(best.map(|(idx, _)| idx))
}
