//! Secure runtime backends
//!
//! * `clear` - cleartext simulation over `f64`; fractional, used for
//!   development and as the arithmetic-circuit stand-in
//! * `gmw` - two-party XOR secret sharing of 32-bit integers with Beaver AND
//!   triples; integer-only, the boolean-circuit stand-in

pub mod clear;
pub mod gmw;

pub use clear::{ClearBit, ClearRuntime, ClearValue};
pub use gmw::{GmwConfig, SharedBit, SharedWord, XorSharedRuntime};
