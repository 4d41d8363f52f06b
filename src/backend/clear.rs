//! Cleartext simulation of a secure runtime
//!
//! Values are held in the clear, so this backend offers no secrecy. It
//! executes exactly the primitive sequence a real arithmetic-circuit backend
//! would, which makes it the reference for correctness and cost accounting.

use tracing::trace;

use crate::audit::{Audit, OpKind};
use crate::error::{Result, XtabsError};
use crate::ops::{Capabilities, SecureOps, SecureRuntime};
use crate::types::Party;

/// Simulated secret scalar
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValue(pub(crate) f64);

/// Simulated secret boolean
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearBit(pub(crate) bool);

/// Cleartext runtime with full primitive accounting
#[derive(Debug, Default)]
pub struct ClearRuntime {
    audit: Audit,
}

impl ClearRuntime {
    pub fn new() -> Self {
        ClearRuntime {
            audit: Audit::new(),
        }
    }

    /// Runtime that also fingerprints the primitive sequence
    pub fn with_trace() -> Self {
        ClearRuntime {
            audit: Audit::with_trace(),
        }
    }

    fn finite(value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(XtabsError::InvalidParameter(format!(
                "non-finite value {}",
                value
            )));
        }
        Ok(value)
    }
}

impl SecureOps for ClearRuntime {
    type Value = ClearValue;
    type Bit = ClearBit;

    fn constant(&self, value: f64) -> Result<ClearValue> {
        self.audit.record(OpKind::Constant)?;
        Ok(ClearValue(Self::finite(value)?))
    }

    fn constant_bit(&self, value: bool) -> Result<ClearBit> {
        self.audit.record(OpKind::Constant)?;
        Ok(ClearBit(value))
    }

    fn equal(&self, a: &ClearValue, b: &ClearValue) -> Result<ClearBit> {
        self.audit.record(OpKind::Equal)?;
        Ok(ClearBit(a.0 == b.0))
    }

    fn less_equal(&self, a: &ClearValue, b: &ClearValue) -> Result<ClearBit> {
        self.audit.record(OpKind::LessEqual)?;
        Ok(ClearBit(a.0 <= b.0))
    }

    fn and(&self, a: &ClearBit, b: &ClearBit) -> Result<ClearBit> {
        self.audit.record(OpKind::And)?;
        Ok(ClearBit(a.0 & b.0))
    }

    fn select(
        &self,
        cond: &ClearBit,
        if_true: &ClearValue,
        if_false: &ClearValue,
    ) -> Result<ClearValue> {
        self.audit.record(OpKind::Select)?;
        Ok(if cond.0 { *if_true } else { *if_false })
    }

    fn select_bit(
        &self,
        cond: &ClearBit,
        if_true: &ClearBit,
        if_false: &ClearBit,
    ) -> Result<ClearBit> {
        self.audit.record(OpKind::SelectBit)?;
        Ok(ClearBit((cond.0 & if_true.0) | (!cond.0 & if_false.0)))
    }

    fn add(&self, a: &ClearValue, b: &ClearValue) -> Result<ClearValue> {
        self.audit.record(OpKind::Add)?;
        Ok(ClearValue(a.0 + b.0))
    }

    fn sub(&self, a: &ClearValue, b: &ClearValue) -> Result<ClearValue> {
        self.audit.record(OpKind::Sub)?;
        Ok(ClearValue(a.0 - b.0))
    }

    fn multiply(&self, a: &ClearValue, b: &ClearValue) -> Result<ClearValue> {
        self.audit.record(OpKind::Multiply)?;
        Ok(ClearValue(a.0 * b.0))
    }
}

impl SecureRuntime for ClearRuntime {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: "clear",
            fractional: true,
        }
    }

    fn input(&self, party: Party, value: f64) -> Result<ClearValue> {
        self.audit.record(OpKind::Input)?;
        trace!(party = %party, "clear input");
        Ok(ClearValue(Self::finite(value)?))
    }

    fn divide(&self, numerator: &ClearValue, denominator: &ClearValue) -> Result<ClearValue> {
        self.audit.record(OpKind::Divide)?;
        if denominator.0 == 0.0 {
            return Err(XtabsError::DivisionByZero);
        }
        Ok(ClearValue(numerator.0 / denominator.0))
    }

    fn sqrt(&self, value: &ClearValue) -> Result<ClearValue> {
        self.audit.record(OpKind::Sqrt)?;
        if value.0 < 0.0 {
            return Err(XtabsError::InvalidParameter(
                "square root of a negative value".to_string(),
            ));
        }
        Ok(ClearValue(value.0.sqrt()))
    }

    fn reveal(&self, value: &ClearValue) -> Result<f64> {
        self.audit.record(OpKind::Reveal)?;
        Ok(value.0)
    }

    fn reveal_bit(&self, bit: &ClearBit) -> Result<bool> {
        self.audit.record(OpKind::Reveal)?;
        Ok(bit.0)
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }
}
