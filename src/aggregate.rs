//! Oblivious group-by aggregation
//!
//! Every row is compared against every category combination, and every
//! accumulator slot is updated for every row through `select`. How rows are
//! spread over groups therefore never shows up in the sequence of primitives:
//! the cost of a query depends only on `(N, K1, K2, shards)`.
//!
//! Averages and standard deviations never divide by a secret zero. A
//! degeneracy bit is computed obliviously per group, the divisor is swapped
//! for the constant one where it is set, and the bit is revealed alongside the
//! statistic so degenerate groups come back as `None`.

use std::ops::Range;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Result, XtabsError};
use crate::ops::SecureRuntime;
use crate::types::{Aggregation, Grid, GroupKeys, XtabsConfig, XtabsResult};
use crate::utils::{check_length, revealed_count, shard_ranges};

/// Constants lifted once per query
struct Tables<V> {
    outer: Vec<V>,
    inner: Vec<V>,
    zero: V,
    one: V,
}

/// Running totals, one slot per cell of the full category cross product
///
/// `totals` holds value sums in the first pass and squared deviations in the
/// second; `counts` holds row counts. A lane left empty is not tracked.
struct Accumulator<V> {
    totals: Vec<V>,
    counts: Vec<V>,
}

impl<V: Clone> Accumulator<V> {
    fn zeroed(cells: usize, zero: &V, totals: bool, counts: bool) -> Self {
        let lane = |on: bool| if on { vec![zero.clone(); cells] } else { Vec::new() };
        Accumulator {
            totals: lane(totals),
            counts: lane(counts),
        }
    }
}

/// Group-by engine over a secure runtime
pub struct ObliviousAggregator<'r, R: SecureRuntime> {
    runtime: &'r R,
    config: XtabsConfig,
}

impl<'r, R: SecureRuntime> ObliviousAggregator<'r, R> {
    pub fn new(runtime: &'r R, config: XtabsConfig) -> Self {
        ObliviousAggregator { runtime, config }
    }

    pub fn config(&self) -> &XtabsConfig {
        &self.config
    }

    /// Run the configured aggregation and reveal its result
    ///
    /// All configuration and shape errors are reported before the first
    /// secure primitive executes.
    pub fn aggregate(
        &self,
        keys: GroupKeys<'_, R::Value>,
        values: Option<&[R::Value]>,
    ) -> Result<XtabsResult> {
        let aggregation = self.config.aggregation;
        self.config.validate(keys.columns(), values.is_some())?;

        let caps = self.runtime.capabilities();
        if aggregation.needs_fractional() && !caps.fractional {
            return Err(XtabsError::UnsupportedOperation {
                backend: caps.backend,
                operation: format!("{} aggregation", aggregation),
            });
        }

        let rows = keys.rows()?;
        if let Some(values) = values {
            check_length("value column", values.len(), rows)?;
        }

        let (k1, k2) = match keys {
            GroupKeys::Single(_) => (self.config.n_cat_1, 1),
            GroupKeys::Pair(_, _) => (self.config.n_cat_1, self.config.n_cat_2),
        };
        info!(
            %aggregation,
            rows,
            n_cat_1 = k1,
            n_cat_2 = k2,
            group_columns = keys.columns(),
            shards = self.config.shards,
            backend = caps.backend,
            "starting oblivious aggregation"
        );
        let before = self.runtime.tally();

        let tables = self.lift_tables(&keys)?;
        let cells = k1 * k2;

        let counted = aggregation != Aggregation::Sum;
        let first = self.scan(rows, cells, &tables, values.is_some(), counted, |acc, i| {
            let matches = self.row_matches(&keys, &tables, i)?;
            self.accumulate(acc, &matches, values.map(|v| &v[i]), &tables)
        })?;
        debug!(%aggregation, "first pass complete");
        self.runtime.check_overflow()?;

        let result = match aggregation {
            Aggregation::Sum => {
                let sums = self.reveal_all(&first.totals)?;
                XtabsResult::Sums(Grid::from_cells(k1, k2, sums))
            }
            Aggregation::Frequency => {
                let counts = first
                    .counts
                    .iter()
                    .map(|c| revealed_count(self.runtime.reveal(c)?))
                    .collect::<Result<Vec<_>>>()?;
                XtabsResult::Frequencies(Grid::from_cells(k1, k2, counts))
            }
            Aggregation::Average => {
                let (averages, empty) =
                    self.guarded_quotients(&first.totals, &first.counts, &tables.zero, &tables)?;
                XtabsResult::Averages(Grid::from_cells(
                    k1,
                    k2,
                    self.reveal_guarded(&averages, &empty)?,
                ))
            }
            Aggregation::StdDev => {
                let values = values.ok_or(XtabsError::MissingValueColumn(aggregation))?;
                let std_devs = self.std_devs(&keys, values, rows, cells, &tables, &first)?;
                XtabsResult::StdDevs(Grid::from_cells(k1, k2, std_devs))
            }
            Aggregation::Mode => XtabsResult::Modes(self.modes(&first.counts, k2, &tables)?),
        };

        let spent = self.runtime.tally().since(&before);
        info!(
            %aggregation,
            primitives = spent.total(),
            reveals = spent.reveal,
            "aggregation revealed"
        );
        Ok(result)
    }

    fn lift_tables(&self, keys: &GroupKeys<'_, R::Value>) -> Result<Tables<R::Value>> {
        let rt = self.runtime;
        let inner = match keys {
            GroupKeys::Single(_) => Vec::new(),
            GroupKeys::Pair(_, _) => rt.category_table(self.config.n_cat_2)?,
        };
        Ok(Tables {
            outer: rt.category_table(self.config.n_cat_1)?,
            inner,
            zero: rt.constant(0.0)?,
            one: rt.constant(1.0)?,
        })
    }

    /// One match bit per category cell for row `i`, in row-major order
    fn row_matches(
        &self,
        keys: &GroupKeys<'_, R::Value>,
        tables: &Tables<R::Value>,
        i: usize,
    ) -> Result<Vec<R::Bit>> {
        let rt = self.runtime;
        match keys {
            GroupKeys::Single(column) => tables
                .outer
                .iter()
                .map(|cat| rt.equal(&column[i], cat))
                .collect(),
            GroupKeys::Pair(outer, inner) => {
                let inner_matches = tables
                    .inner
                    .iter()
                    .map(|cat| rt.equal(&inner[i], cat))
                    .collect::<Result<Vec<_>>>()?;
                let mut matches = Vec::with_capacity(tables.outer.len() * tables.inner.len());
                for cat in &tables.outer {
                    let outer_match = rt.equal(&outer[i], cat)?;
                    for inner_match in &inner_matches {
                        matches.push(rt.and(&outer_match, inner_match)?);
                    }
                }
                Ok(matches)
            }
        }
    }

    fn accumulate(
        &self,
        acc: &mut Accumulator<R::Value>,
        matches: &[R::Bit],
        value: Option<&R::Value>,
        tables: &Tables<R::Value>,
    ) -> Result<()> {
        let rt = self.runtime;
        for (c, m) in matches.iter().enumerate() {
            if let Some(value) = value {
                let term = rt.select(m, value, &tables.zero)?;
                acc.totals[c] = rt.add(&acc.totals[c], &term)?;
            }
            if !acc.counts.is_empty() {
                let term = rt.select(m, &tables.one, &tables.zero)?;
                acc.counts[c] = rt.add(&acc.counts[c], &term)?;
            }
        }
        Ok(())
    }

    /// Run `visit` over every row, shard by shard, and merge the partials
    fn scan<F>(
        &self,
        rows: usize,
        cells: usize,
        tables: &Tables<R::Value>,
        totals: bool,
        counts: bool,
        visit: F,
    ) -> Result<Accumulator<R::Value>>
    where
        F: Fn(&mut Accumulator<R::Value>, usize) -> Result<()> + Sync,
    {
        let run = |range: Range<usize>| -> Result<Accumulator<R::Value>> {
            let mut acc = Accumulator::zeroed(cells, &tables.zero, totals, counts);
            for i in range {
                visit(&mut acc, i)?;
            }
            Ok(acc)
        };

        let ranges = shard_ranges(rows, self.config.shards);
        let partials = if ranges.len() == 1 {
            ranges.into_iter().map(run).collect::<Result<Vec<_>>>()?
        } else {
            ranges.into_par_iter().map(run).collect::<Result<Vec<_>>>()?
        };

        self.merge(partials)
    }

    fn merge(&self, partials: Vec<Accumulator<R::Value>>) -> Result<Accumulator<R::Value>> {
        let rt = self.runtime;
        let mut partials = partials.into_iter();
        let mut merged = partials
            .next()
            .ok_or_else(|| XtabsError::InvalidParameter("no shards to merge".to_string()))?;
        for part in partials {
            for (slot, other) in merged.totals.iter_mut().zip(&part.totals) {
                *slot = rt.add(slot, other)?;
            }
            for (slot, other) in merged.counts.iter_mut().zip(&part.counts) {
                *slot = rt.add(slot, other)?;
            }
        }
        Ok(merged)
    }

    /// `numerator / (count - offset)` per cell, with the divisor replaced by
    /// one wherever `count <= offset`; returns the quotients and those bits
    fn guarded_quotients(
        &self,
        numerators: &[R::Value],
        counts: &[R::Value],
        offset: &R::Value,
        tables: &Tables<R::Value>,
    ) -> Result<(Vec<R::Value>, Vec<R::Bit>)> {
        let rt = self.runtime;
        let mut quotients = Vec::with_capacity(counts.len());
        let mut degenerate = Vec::with_capacity(counts.len());
        for (numerator, count) in numerators.iter().zip(counts) {
            let too_few = rt.less_equal(count, offset)?;
            let divisor = rt.select(&too_few, &tables.one, &rt.sub(count, offset)?)?;
            quotients.push(rt.divide(numerator, &divisor)?);
            degenerate.push(too_few);
        }
        Ok((quotients, degenerate))
    }

    fn std_devs(
        &self,
        keys: &GroupKeys<'_, R::Value>,
        values: &[R::Value],
        rows: usize,
        cells: usize,
        tables: &Tables<R::Value>,
        first: &Accumulator<R::Value>,
    ) -> Result<Vec<Option<f64>>> {
        let rt = self.runtime;
        let (averages, _) =
            self.guarded_quotients(&first.totals, &first.counts, &tables.zero, tables)?;

        let squared = self.scan(rows, cells, tables, true, false, |acc, i| {
            let matches = self.row_matches(keys, tables, i)?;
            for (c, m) in matches.iter().enumerate() {
                let deviation = rt.sub(&values[i], &averages[c])?;
                let square = rt.multiply(&deviation, &deviation)?;
                let term = rt.select(m, &square, &tables.zero)?;
                acc.totals[c] = rt.add(&acc.totals[c], &term)?;
            }
            Ok(())
        })?;
        debug!("second pass complete");

        let ddof = rt.constant(f64::from(self.config.effective_ddof()))?;
        let (variances, degenerate) =
            self.guarded_quotients(&squared.totals, &first.counts, &ddof, tables)?;
        let std_devs = variances
            .iter()
            .map(|v| rt.sqrt(v))
            .collect::<Result<Vec<_>>>()?;

        self.reveal_guarded(&std_devs, &degenerate)
    }

    /// Branch-free arg-max per outer category; ties go to the last category
    fn modes(&self, counts: &[R::Value], k2: usize, tables: &Tables<R::Value>) -> Result<Vec<u64>> {
        let rt = self.runtime;
        let mut modes = Vec::with_capacity(counts.len() / k2.max(1));
        for row in counts.chunks(k2) {
            let mut best = tables.zero.clone();
            let mut mode = tables.zero.clone();
            for (count, category) in row.iter().zip(&tables.inner) {
                let at_least = rt.less_equal(&best, count)?;
                best = rt.select(&at_least, count, &best)?;
                mode = rt.select(&at_least, category, &mode)?;
            }
            modes.push(revealed_count(rt.reveal(&mode)?)?);
        }
        Ok(modes)
    }

    fn reveal_all(&self, cells: &[R::Value]) -> Result<Vec<f64>> {
        cells.iter().map(|c| self.runtime.reveal(c)).collect()
    }

    fn reveal_guarded(
        &self,
        cells: &[R::Value],
        degenerate: &[R::Bit],
    ) -> Result<Vec<Option<f64>>> {
        cells
            .iter()
            .zip(degenerate)
            .map(|(cell, bit)| {
                let skip = self.runtime.reveal_bit(bit)?;
                let value = self.runtime.reveal(cell)?;
                Ok(if skip { None } else { Some(value) })
            })
            .collect()
    }
}
