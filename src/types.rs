//! Core types and data structures

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XtabsError};

/// Statistic computed per group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Sum,
    Average,
    /// Standard deviation, population or sample depending on ddof
    StdDev,
    /// Row counts per (outer, inner) category pair
    Frequency,
    /// Most frequent inner category per outer category
    Mode,
}

impl Aggregation {
    /// Whether the aggregation reads a value column
    pub fn uses_values(&self) -> bool {
        matches!(
            self,
            Aggregation::Sum | Aggregation::Average | Aggregation::StdDev
        )
    }

    /// Whether the aggregation needs secure division and square roots
    pub fn needs_fractional(&self) -> bool {
        matches!(self, Aggregation::Average | Aggregation::StdDev)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Average => write!(f, "average"),
            Aggregation::StdDev => write!(f, "std"),
            Aggregation::Frequency => write!(f, "freq"),
            Aggregation::Mode => write!(f, "mode"),
        }
    }
}

/// Party contributing an input column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    /// Party 0
    Alice,
    /// Party 1
    Bob,
}

impl Party {
    pub fn id(&self) -> usize {
        match self {
            Party::Alice => 0,
            Party::Bob => 1,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Alice => write!(f, "Alice"),
            Party::Bob => write!(f, "Bob"),
        }
    }
}

/// Grouping columns of a query, borrowed for the duration of the scan
#[derive(Debug)]
pub enum GroupKeys<'a, V> {
    Single(&'a [V]),
    Pair(&'a [V], &'a [V]),
}

impl<V> GroupKeys<'_, V> {
    pub fn columns(&self) -> usize {
        match self {
            GroupKeys::Single(_) => 1,
            GroupKeys::Pair(_, _) => 2,
        }
    }

    /// Number of rows, checking that both key columns agree
    pub fn rows(&self) -> Result<usize> {
        match self {
            GroupKeys::Single(keys) => Ok(keys.len()),
            GroupKeys::Pair(outer, inner) => {
                if outer.len() != inner.len() {
                    return Err(XtabsError::LengthMismatch(format!(
                        "first grouping column: {}, second grouping column: {}",
                        outer.len(),
                        inner.len()
                    )));
                }
                Ok(outer.len())
            }
        }
    }
}

/// Configuration for one aggregation query
///
/// Every field is public: sizes and kinds are fixed before any row is read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XtabsConfig {
    pub aggregation: Aggregation,
    /// Category count of the first grouping column
    pub n_cat_1: usize,
    /// Category count of the second grouping column (ignored for one column)
    pub n_cat_2: usize,
    /// Delta degrees of freedom, std only
    pub ddof: Option<u8>,
    /// Number of contiguous row ranges scanned in parallel
    pub shards: usize,
}

impl Default for XtabsConfig {
    fn default() -> Self {
        XtabsConfig {
            aggregation: Aggregation::Sum,
            n_cat_1: 4,
            n_cat_2: 4,
            ddof: None,
            shards: 1,
        }
    }
}

impl XtabsConfig {
    pub fn new(aggregation: Aggregation) -> Self {
        XtabsConfig {
            aggregation,
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, n_cat_1: usize, n_cat_2: usize) -> Self {
        self.n_cat_1 = n_cat_1;
        self.n_cat_2 = n_cat_2;
        self
    }

    pub fn with_ddof(mut self, ddof: u8) -> Self {
        self.ddof = Some(ddof);
        self
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Effective ddof (defaults to the population estimator)
    pub fn effective_ddof(&self) -> u8 {
        self.ddof.unwrap_or(0)
    }

    /// Check everything that can be checked without looking at the data
    pub fn validate(&self, group_columns: usize, has_values: bool) -> Result<()> {
        if self.n_cat_1 == 0 {
            return Err(XtabsError::InvalidCategoryCount {
                column: 1,
                count: self.n_cat_1,
            });
        }
        if group_columns == 2 && self.n_cat_2 == 0 {
            return Err(XtabsError::InvalidCategoryCount {
                column: 2,
                count: self.n_cat_2,
            });
        }
        if self.shards == 0 {
            return Err(XtabsError::InvalidParameter(
                "shard count must be at least 1".to_string(),
            ));
        }

        match self.aggregation {
            Aggregation::Frequency | Aggregation::Mode if group_columns != 2 => {
                return Err(XtabsError::UnsupportedGrouping {
                    aggregation: self.aggregation,
                    columns: group_columns,
                });
            }
            _ => {}
        }

        match (self.aggregation, self.ddof) {
            (Aggregation::StdDev, Some(d)) if d > 1 => {
                return Err(XtabsError::InvalidDdof {
                    aggregation: self.aggregation,
                    ddof: self.ddof,
                });
            }
            (Aggregation::StdDev, _) | (_, None) => {}
            (_, Some(_)) => {
                return Err(XtabsError::InvalidDdof {
                    aggregation: self.aggregation,
                    ddof: self.ddof,
                });
            }
        }

        match (self.aggregation.uses_values(), has_values) {
            (true, false) => Err(XtabsError::MissingValueColumn(self.aggregation)),
            (false, true) => Err(XtabsError::UnexpectedValueColumn(self.aggregation)),
            _ => Ok(()),
        }
    }
}

/// Row-major matrix of revealed values
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    pub(crate) fn from_cells(rows: usize, cols: usize, cells: Vec<T>) -> Self {
        debug_assert_eq!(rows * cols, cells.len());
        Grid { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    pub fn row(&self, row: usize) -> Option<&[T]> {
        if row >= self.rows {
            return None;
        }
        self.cells.get(row * self.cols..(row + 1) * self.cols)
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        self.cells.chunks(self.cols.max(1))
    }
}

impl Grid<u64> {
    pub fn total(&self) -> u64 {
        self.cells.iter().sum()
    }

    pub fn row_sums(&self) -> Vec<u64> {
        self.iter_rows().map(|r| r.iter().sum()).collect()
    }
}

/// Revealed output of an aggregation query
///
/// One-column groupings produce grids with a single column. Averages and
/// standard deviations of degenerate groups (no rows, or no more rows than
/// ddof) are `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum XtabsResult {
    Sums(Grid<f64>),
    Averages(Grid<Option<f64>>),
    StdDevs(Grid<Option<f64>>),
    Frequencies(Grid<u64>),
    Modes(Vec<u64>),
}

impl XtabsResult {
    pub fn aggregation(&self) -> Aggregation {
        match self {
            XtabsResult::Sums(_) => Aggregation::Sum,
            XtabsResult::Averages(_) => Aggregation::Average,
            XtabsResult::StdDevs(_) => Aggregation::StdDev,
            XtabsResult::Frequencies(_) => Aggregation::Frequency,
            XtabsResult::Modes(_) => Aggregation::Mode,
        }
    }

    pub fn as_sums(&self) -> Option<&Grid<f64>> {
        match self {
            XtabsResult::Sums(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_averages(&self) -> Option<&Grid<Option<f64>>> {
        match self {
            XtabsResult::Averages(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_std_devs(&self) -> Option<&Grid<Option<f64>>> {
        match self {
            XtabsResult::StdDevs(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_frequencies(&self) -> Option<&Grid<u64>> {
        match self {
            XtabsResult::Frequencies(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_modes(&self) -> Option<&[u64]> {
        match self {
            XtabsResult::Modes(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for XtabsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XtabsResult::Modes(modes) => write!(f, "Modes({} groups)", modes.len()),
            XtabsResult::Sums(g) => write!(f, "Sums({}x{})", g.rows(), g.cols()),
            XtabsResult::Averages(g) => write!(f, "Averages({}x{})", g.rows(), g.cols()),
            XtabsResult::StdDevs(g) => write!(f, "StdDevs({}x{})", g.rows(), g.cols()),
            XtabsResult::Frequencies(g) => {
                write!(f, "Frequencies({}x{}, total {})", g.rows(), g.cols(), g.total())
            }
        }
    }
}
