//! Branch-free bin lookup for secret values
//!
//! Items fall into bin `i` when `edges[i] < x <= edges[i + 1]`. Values at or
//! below the first edge land in bin 0 and values above the last edge are
//! clamped into the last bin, so every row is counted exactly once.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, XtabsError};
use crate::ops::{SecureOps, SecureRuntime};

/// Strictly ascending public bin thresholds (`bins + 1` of them)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(XtabsError::InvalidBinCount(edges.len().saturating_sub(1)));
        }
        if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
            return Err(XtabsError::InvalidParameter(format!(
                "non-finite bin edge {}",
                bad
            )));
        }
        for (i, pair) in edges.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                return Err(XtabsError::NonAscendingEdges {
                    index: i,
                    lower: pair[0],
                    upper: pair[1],
                });
            }
        }
        Ok(BinEdges { edges })
    }

    /// `bins + 1` evenly spaced edges from `min` to `max` inclusive
    pub fn linspace(min: f64, max: f64, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(XtabsError::InvalidBinCount(bins));
        }
        let step = (max - min) / bins as f64;
        let mut edges: Vec<f64> = (0..bins).map(|i| min + step * i as f64).collect();
        edges.push(max);
        Self::new(edges)
    }

    /// Integer edges for domains without fractions
    ///
    /// The step is `floor((max - min) / bins)`; the last edge is always `max`.
    pub fn linspace_integral(min: f64, max: f64, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(XtabsError::InvalidBinCount(bins));
        }
        let step = ((max - min) / bins as f64).floor();
        if step < 1.0 {
            return Err(XtabsError::InvalidParameter(format!(
                "range [{}, {}] is too narrow for {} integral bins",
                min, max, bins
            )));
        }
        let mut edges: Vec<f64> = (0..bins).map(|i| min + step * i as f64).collect();
        edges.push(max);
        Self::new(edges)
    }

    /// Reveal the extremes of a secret column and space edges between them
    ///
    /// The two extremes are the only values disclosed. A range too narrow for
    /// `bins` is widened so that every row still lands in a bin: by half a unit
    /// on each side for fractional domains, or to `[min, min + bins]` with unit
    /// steps for integral ones.
    pub fn from_revealed_extremes<R: SecureRuntime>(
        runtime: &R,
        column: &[R::Value],
        bins: usize,
    ) -> Result<Self> {
        if bins == 0 {
            return Err(XtabsError::InvalidBinCount(bins));
        }
        let (min, max) = oblivious_extremes(runtime, column)?;
        let min = runtime.reveal(&min)?;
        let max = runtime.reveal(&max)?;

        if runtime.capabilities().fractional {
            if max > min {
                debug!(bins, "bin edges derived from revealed extremes");
                Self::linspace(min, max, bins)
            } else {
                debug!(bins, "degenerate range widened by half a unit");
                Self::linspace(min - 0.5, max + 0.5, bins)
            }
        } else if max - min >= bins as f64 {
            debug!(bins, "bin edges derived from revealed extremes");
            Self::linspace_integral(min, max, bins)
        } else {
            debug!(bins, "narrow integral range widened to unit bins");
            Self::linspace_integral(min, min + bins as f64, bins)
        }
    }

    pub fn bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.edges
    }

    pub fn first(&self) -> f64 {
        self.edges[0]
    }

    pub fn last(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }
}

impl TryFrom<Vec<f64>> for BinEdges {
    type Error = XtabsError;

    fn try_from(edges: Vec<f64>) -> Result<Self> {
        BinEdges::new(edges)
    }
}

impl From<BinEdges> for Vec<f64> {
    fn from(edges: BinEdges) -> Self {
        edges.edges
    }
}

impl fmt::Display for BinEdges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinEdges({} bins, {}..{})", self.bins(), self.first(), self.last())
    }
}

/// Digitizer bound to one edge sequence, with its constants lifted once
pub struct ObliviousDigitizer<'r, R: SecureOps> {
    runtime: &'r R,
    edges: Vec<R::Value>,
    bin_labels: Vec<R::Value>,
    no: R::Bit,
    yes: R::Bit,
}

impl<'r, R: SecureOps> ObliviousDigitizer<'r, R> {
    /// Lift public edges into the runtime
    pub fn new(runtime: &'r R, edges: &BinEdges) -> Result<Self> {
        let lifted = runtime.constants(edges.as_slice())?;
        Self::from_secret_edges(runtime, lifted)
    }

    /// Use edges that are already secret
    ///
    /// Ascent cannot be checked without revealing them; the caller vouches
    /// for it.
    pub fn from_secret_edges(runtime: &'r R, edges: Vec<R::Value>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(XtabsError::InvalidBinCount(edges.len().saturating_sub(1)));
        }
        let bin_labels = runtime.category_table(edges.len() - 1)?;
        Ok(ObliviousDigitizer {
            runtime,
            edges,
            bin_labels,
            no: runtime.constant_bit(false)?,
            yes: runtime.constant_bit(true)?,
        })
    }

    pub fn bins(&self) -> usize {
        self.bin_labels.len()
    }

    /// Secret bin index of `value`
    ///
    /// Always performs exactly `bins()` comparisons.
    pub fn digitize(&self, value: &R::Value) -> Result<R::Value> {
        let rt = self.runtime;
        let mut found = self.no.clone();
        let mut bin = self.bin_labels[self.bins() - 1].clone();

        for i in 1..self.edges.len() {
            let leq = rt.less_equal(value, &self.edges[i])?;
            // fires only at the first edge that is >= value
            let take = rt.select_bit(&found, &self.no, &leq)?;
            bin = rt.select(&take, &self.bin_labels[i - 1], &bin)?;
            found = rt.select_bit(&found, &self.yes, &take)?;
        }

        Ok(bin)
    }

    pub fn digitize_column(&self, column: &[R::Value]) -> Result<Vec<R::Value>> {
        column.iter().map(|v| self.digitize(v)).collect()
    }

    /// Same as `digitize_column`, spread over the rayon pool
    pub fn par_digitize_column(&self, column: &[R::Value]) -> Result<Vec<R::Value>> {
        column.par_iter().map(|v| self.digitize(v)).collect()
    }
}

/// Secret `(min, max)` of a non-empty column, two comparisons per row
pub fn oblivious_extremes<R: SecureOps>(
    runtime: &R,
    column: &[R::Value],
) -> Result<(R::Value, R::Value)> {
    let (first, rest) = column.split_first().ok_or(XtabsError::EmptyColumn)?;
    let mut min = first.clone();
    let mut max = first.clone();

    for value in rest {
        let above = runtime.less_equal(&max, value)?;
        max = runtime.select(&above, value, &max)?;
        let below = runtime.less_equal(value, &min)?;
        min = runtime.select(&below, value, &min)?;
    }

    Ok((min, max))
}
