//! Error types for the xtabs library

use thiserror::Error;

use crate::types::Aggregation;

pub type Result<T> = std::result::Result<T, XtabsError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XtabsError {
    #[error("Invalid category count for grouping column {column}: {count} (must be at least 1)")]
    InvalidCategoryCount { column: usize, count: usize },

    #[error("{aggregation} aggregation requires two grouping columns, got {columns}")]
    UnsupportedGrouping {
        aggregation: Aggregation,
        columns: usize,
    },

    #[error("Invalid ddof for {aggregation}: {ddof:?} (only std accepts ddof, and only 0 or 1)")]
    InvalidDdof {
        aggregation: Aggregation,
        ddof: Option<u8>,
    },

    #[error("{0} aggregation requires a value column")]
    MissingValueColumn(Aggregation),

    #[error("{0} aggregation does not take a value column")]
    UnexpectedValueColumn(Aggregation),

    #[error("Operation not supported by the {backend} backend: {operation}")]
    UnsupportedOperation {
        backend: &'static str,
        operation: String,
    },

    #[error("Mismatched lengths: {0}")]
    LengthMismatch(String),

    #[error("Bin edges must be strictly ascending: edges[{index}] = {lower} is not below the next edge {upper}")]
    NonAscendingEdges { index: usize, lower: f64, upper: f64 },

    #[error("Invalid bin count: {0} (need at least one bin)")]
    InvalidBinCount(usize),

    #[error("Empty column provided where at least one row is required")]
    EmptyColumn,

    #[error("Value {0} is not representable in an integer-only domain")]
    NonIntegral(f64),

    #[error("Secret arithmetic overflowed the value range of the {backend} backend")]
    Overflow { backend: &'static str },

    #[error("Division by zero inside the secure runtime")]
    DivisionByZero,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Backend error: {0}")]
    Backend(String),
}
