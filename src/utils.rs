//! Utility functions shared by the oblivious scans

use std::ops::Range;

use crate::error::{Result, XtabsError};

/// Split `rows` into exactly `shards` contiguous ranges of `ceil(rows / shards)`
///
/// Trailing ranges may be empty. The layout depends on public sizes only.
pub fn shard_ranges(rows: usize, shards: usize) -> Vec<Range<usize>> {
    let shards = shards.max(1);
    let chunk = (rows + shards - 1) / shards;
    (0..shards)
        .map(|s| (s * chunk).min(rows)..((s + 1) * chunk).min(rows))
        .collect()
}

/// Interpret a revealed value as a row count or category label
pub fn revealed_count(value: f64) -> Result<u64> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(XtabsError::Backend(format!(
            "revealed {} where a non-negative integer was expected",
            value
        )));
    }
    Ok(value as u64)
}

/// Check that a column has the expected number of rows
pub fn check_length(name: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(XtabsError::LengthMismatch(format!(
            "{}: {}, expected rows: {}",
            name, len, expected
        )));
    }
    Ok(())
}
