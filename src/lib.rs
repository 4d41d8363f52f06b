//! # Oblivious Cross-Tabulation Library
//!
//! This library computes grouped statistics and 2D histograms over secret
//! columns without revealing anything but the final aggregates:
//! - Group-by sum, average, standard deviation, frequency and mode
//! - Branch-free digitization of secret values into public bins
//! - Two-dimensional histograms built from digitized columns
//!
//! ## Features
//!
//! - **Data-independent cost**: every row touches every group, so the
//!   sequence of secure primitives depends only on public sizes
//! - **Pluggable runtimes**: the algorithms are generic over [`SecureRuntime`];
//!   a cleartext simulator and an XOR-shared two-party backend are included
//! - **Auditing**: every primitive is counted, and the sequence can be
//!   fingerprinted to check that two datasets produce the same trace
//! - **Sharded scans**: rows can be split into public ranges scanned in parallel
//!
//! ## Example
//!
//! ```rust
//! use xtabs::{Aggregation, ClearRuntime, GroupKeys, ObliviousAggregator, Party,
//!             SecureRuntime, XtabsConfig};
//!
//! let runtime = ClearRuntime::new();
//!
//! // Party 0 holds the group labels, party 1 the values
//! let groups = runtime
//!     .input_column(Party::Alice, &[0.0, 1.0, 0.0, 1.0])
//!     .unwrap();
//! let values = runtime
//!     .input_column(Party::Bob, &[10.0, 1.0, 20.0, 2.0])
//!     .unwrap();
//!
//! let config = XtabsConfig::new(Aggregation::Average).with_categories(2, 0);
//! let result = ObliviousAggregator::new(&runtime, config)
//!     .aggregate(GroupKeys::Single(&groups), Some(&values))
//!     .unwrap();
//!
//! assert_eq!(result.as_averages().unwrap().cells(), &[Some(15.0), Some(1.5)]);
//! ```

pub mod aggregate;
pub mod audit;
pub mod backend;
pub mod digitize;
pub mod error;
pub mod histogram;
pub mod ops;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use aggregate::ObliviousAggregator;
pub use audit::{Audit, OpKind, OpTally};
pub use backend::{ClearRuntime, GmwConfig, XorSharedRuntime};
pub use digitize::{oblivious_extremes, BinEdges, ObliviousDigitizer};
pub use error::{Result, XtabsError};
pub use histogram::{Histogram, Histogram2DBuilder};
pub use ops::{Capabilities, SecureOps, SecureRuntime};
pub use types::{Aggregation, Grid, GroupKeys, Party, XtabsConfig, XtabsResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
