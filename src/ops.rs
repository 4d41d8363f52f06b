//! Secure operations consumed by the oblivious algorithms
//!
//! The algorithms in this crate never see plaintext. They are generic over a
//! runtime that hides values behind `Value` and `Bit` handles and exposes a
//! small capability set. Backends implement these traits once; the
//! aggregator, digitizer and histogram builder are written once against them.

use crate::audit::{Audit, OpTally};
use crate::error::Result;
use crate::types::Party;

/// Static description of what a backend can compute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Short backend name used in errors and logs
    pub backend: &'static str,
    /// Whether `divide` and `sqrt` are available (arithmetic, fixed-point domains)
    pub fractional: bool,
}

/// Primitive secret arithmetic and comparison
///
/// None of these operations reveal anything. Implementations must execute the
/// same work for every input so callers can reason about cost from shapes alone.
pub trait SecureOps: Sync {
    /// Opaque secret scalar
    type Value: Clone + Send + Sync;
    /// Opaque secret boolean
    type Bit: Clone + Send + Sync;

    /// Lift a public constant into the secret domain
    fn constant(&self, value: f64) -> Result<Self::Value>;

    /// Lift a public boolean into the secret domain
    fn constant_bit(&self, value: bool) -> Result<Self::Bit>;

    /// Secret `a == b`
    fn equal(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Bit>;

    /// Secret `a <= b`
    fn less_equal(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Bit>;

    /// Secret conjunction
    fn and(&self, a: &Self::Bit, b: &Self::Bit) -> Result<Self::Bit>;

    /// Branch-free `if cond { if_true } else { if_false }`
    fn select(
        &self,
        cond: &Self::Bit,
        if_true: &Self::Value,
        if_false: &Self::Value,
    ) -> Result<Self::Value>;

    /// Branch-free selection between two secret bits
    fn select_bit(&self, cond: &Self::Bit, if_true: &Self::Bit, if_false: &Self::Bit)
        -> Result<Self::Bit>;

    /// Secret `a + b`
    fn add(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value>;

    /// Secret `a - b`
    fn sub(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value>;

    /// Secret `a * b`
    fn multiply(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value>;

    /// Lift a run of public constants
    fn constants(&self, values: &[f64]) -> Result<Vec<Self::Value>> {
        values.iter().map(|v| self.constant(*v)).collect()
    }

    /// Lift the category labels `0..count`
    fn category_table(&self, count: usize) -> Result<Vec<Self::Value>> {
        (0..count).map(|c| self.constant(c as f64)).collect()
    }
}

/// A secure computation session between two parties
pub trait SecureRuntime: SecureOps {
    fn capabilities(&self) -> Capabilities;

    /// Secret-share a value contributed by `party`
    fn input(&self, party: Party, value: f64) -> Result<Self::Value>;

    /// Secret division; only available on fractional backends
    fn divide(&self, numerator: &Self::Value, denominator: &Self::Value) -> Result<Self::Value>;

    /// Secret square root; only available on fractional backends
    fn sqrt(&self, value: &Self::Value) -> Result<Self::Value>;

    /// Open a value to both parties
    fn reveal(&self, value: &Self::Value) -> Result<f64>;

    /// Open a bit to both parties
    fn reveal_bit(&self, bit: &Self::Bit) -> Result<bool>;

    /// Fail if a secret `add` or `sub` has overflowed since the last check
    ///
    /// Wrapping backends open a single sticky bit here and clear it.
    fn check_overflow(&self) -> Result<()> {
        Ok(())
    }

    /// Primitive accounting for this session
    fn audit(&self) -> &Audit;

    /// Secret-share a whole column contributed by `party`
    fn input_column(&self, party: Party, values: &[f64]) -> Result<Vec<Self::Value>> {
        values.iter().map(|v| self.input(party, *v)).collect()
    }

    /// Snapshot of the primitive counts so far
    fn tally(&self) -> OpTally {
        self.audit().tally()
    }
}
