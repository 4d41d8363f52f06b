//! Two-dimensional histograms over secret columns
//!
//! Both columns are digitized obliviously, and the resulting secret bin
//! indices are counted with the aggregator's frequency scan. Only the cell
//! counts are revealed.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::ObliviousAggregator;
use crate::digitize::{BinEdges, ObliviousDigitizer};
use crate::error::{Result, XtabsError};
use crate::ops::SecureRuntime;
use crate::types::{Aggregation, Grid, GroupKeys, XtabsConfig};
use crate::utils::check_length;

/// Revealed 2D histogram with the edges used to build it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub edges_x: BinEdges,
    pub edges_y: BinEdges,
    counts: Grid<u64>,
}

impl Histogram {
    /// Counts indexed by `(x bin, y bin)`
    pub fn counts(&self) -> &Grid<u64> {
        &self.counts
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u64> {
        self.counts.get(x, y).copied()
    }

    /// Equals the number of input rows, since out-of-range values are clamped
    pub fn total(&self) -> u64 {
        self.counts.total()
    }
}

/// Builds histograms over a secure runtime
pub struct Histogram2DBuilder<'r, R: SecureRuntime> {
    runtime: &'r R,
    shards: usize,
}

impl<'r, R: SecureRuntime> Histogram2DBuilder<'r, R> {
    pub fn new(runtime: &'r R) -> Self {
        Histogram2DBuilder { runtime, shards: 1 }
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Histogram of `(col_a, col_b)` over public edges
    pub fn build(
        &self,
        col_a: &[R::Value],
        col_b: &[R::Value],
        edges_x: &BinEdges,
        edges_y: &BinEdges,
    ) -> Result<Histogram> {
        check_length("second histogram column", col_b.len(), col_a.len())?;
        if self.shards == 0 {
            return Err(XtabsError::InvalidParameter(
                "shard count must be at least 1".to_string(),
            ));
        }
        info!(
            rows = col_a.len(),
            bins_x = edges_x.bins(),
            bins_y = edges_y.bins(),
            shards = self.shards,
            "building oblivious 2d histogram"
        );

        let bins_a = self.digitize(col_a, edges_x)?;
        let bins_b = self.digitize(col_b, edges_y)?;

        let config = XtabsConfig::new(Aggregation::Frequency)
            .with_categories(edges_x.bins(), edges_y.bins())
            .with_shards(self.shards);
        let result = ObliviousAggregator::new(self.runtime, config)
            .aggregate(GroupKeys::Pair(&bins_a, &bins_b), None)?;

        let counts = match result.as_frequencies() {
            Some(counts) => counts.clone(),
            None => {
                return Err(XtabsError::Backend(format!(
                    "frequency scan returned {}",
                    result
                )))
            }
        };

        Ok(Histogram {
            edges_x: edges_x.clone(),
            edges_y: edges_y.clone(),
            counts,
        })
    }

    /// Histogram with edges spaced between each column's revealed extremes
    pub fn build_auto(
        &self,
        col_a: &[R::Value],
        col_b: &[R::Value],
        bins_x: usize,
        bins_y: usize,
    ) -> Result<Histogram> {
        check_length("second histogram column", col_b.len(), col_a.len())?;
        if bins_x == 0 {
            return Err(XtabsError::InvalidBinCount(bins_x));
        }
        if bins_y == 0 {
            return Err(XtabsError::InvalidBinCount(bins_y));
        }
        let edges_x = BinEdges::from_revealed_extremes(self.runtime, col_a, bins_x)?;
        let edges_y = BinEdges::from_revealed_extremes(self.runtime, col_b, bins_y)?;
        self.build(col_a, col_b, &edges_x, &edges_y)
    }

    fn digitize(&self, column: &[R::Value], edges: &BinEdges) -> Result<Vec<R::Value>> {
        let digitizer = ObliviousDigitizer::new(self.runtime, edges)?;
        if self.shards > 1 {
            digitizer.par_digitize_column(column)
        } else {
            digitizer.digitize_column(column)
        }
    }
}
