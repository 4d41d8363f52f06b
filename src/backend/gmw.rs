//! Two-party XOR secret sharing over 32-bit words (GMW style)
//!
//! Each secret word is split into two shares whose XOR is the value. XOR and
//! shifts are local; every AND consumes one Beaver triple handed out by an
//! in-process trusted dealer. Integers are two's complement and wrap at 2^32.
//! Comparison and arithmetic are evaluated as boolean circuits, so the number
//! of AND gates per primitive is constant.
//!
//! The domain has no fractions: `divide` and `sqrt` are unsupported and
//! non-integral inputs are rejected.
//!
//! Words wrap, but `add` and `sub` fold a signed-overflow bit into a secret
//! sticky flag. `check_overflow` opens that one bit and clears it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::audit::{Audit, OpKind};
use crate::error::{Result, XtabsError};
use crate::ops::{Capabilities, SecureOps, SecureRuntime};
use crate::types::Party;

const WORD_BITS: usize = 32;
const SIGN_BIT: u32 = 1 << 31;
const BACKEND: &str = "gmw";

/// XOR-shared boolean
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SharedBit {
    alice: bool,
    bob: bool,
}

impl SharedBit {
    fn public(value: bool) -> Self {
        SharedBit {
            alice: value,
            bob: false,
        }
    }

    fn xor(self, other: SharedBit) -> SharedBit {
        SharedBit {
            alice: self.alice ^ other.alice,
            bob: self.bob ^ other.bob,
        }
    }

    fn not(self) -> SharedBit {
        SharedBit {
            alice: !self.alice,
            bob: self.bob,
        }
    }
}

/// XOR-shared 32-bit word
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SharedWord {
    alice: u32,
    bob: u32,
}

impl SharedWord {
    fn public(value: u32) -> Self {
        SharedWord {
            alice: value,
            bob: 0,
        }
    }

    fn xor(self, other: SharedWord) -> SharedWord {
        SharedWord {
            alice: self.alice ^ other.alice,
            bob: self.bob ^ other.bob,
        }
    }

    fn xor_public(self, mask: u32) -> SharedWord {
        SharedWord {
            alice: self.alice ^ mask,
            bob: self.bob,
        }
    }

    fn not(self) -> SharedWord {
        self.xor_public(u32::MAX)
    }

    fn shl(self, n: usize) -> SharedWord {
        SharedWord {
            alice: self.alice << n,
            bob: self.bob << n,
        }
    }

    fn shr(self, n: usize) -> SharedWord {
        SharedWord {
            alice: self.alice >> n,
            bob: self.bob >> n,
        }
    }

    fn bit(self, i: usize) -> SharedBit {
        SharedBit {
            alice: (self.alice >> i) & 1 == 1,
            bob: (self.bob >> i) & 1 == 1,
        }
    }

    /// Word whose lowest bit is `bit`
    fn from_bit(bit: SharedBit) -> SharedWord {
        SharedWord {
            alice: bit.alice as u32,
            bob: bit.bob as u32,
        }
    }

    /// Word with every bit equal to `bit`
    fn spread(bit: SharedBit) -> SharedWord {
        SharedWord {
            alice: 0u32.wrapping_sub(bit.alice as u32),
            bob: 0u32.wrapping_sub(bit.bob as u32),
        }
    }

    fn from_bits(bits: &[SharedBit; WORD_BITS]) -> SharedWord {
        let mut word = SharedWord::default();
        for (i, b) in bits.iter().enumerate() {
            word.alice |= (b.alice as u32) << i;
            word.bob |= (b.bob as u32) << i;
        }
        word
    }

    /// Both parties publish their share; only used on masked values
    fn open(self) -> u32 {
        self.alice ^ self.bob
    }
}

/// Configuration for the XOR-sharing runtime
#[derive(Clone, Debug, Default)]
pub struct GmwConfig {
    /// Dealer seed; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Fingerprint the primitive sequence
    pub trace: bool,
}

/// Two-party XOR-sharing runtime with a trusted triple dealer
#[derive(Debug)]
pub struct XorSharedRuntime {
    dealer: Mutex<StdRng>,
    audit: Audit,
    and_gates: AtomicU64,
    overflow: Mutex<SharedBit>,
}

impl Default for XorSharedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl XorSharedRuntime {
    pub fn new() -> Self {
        Self::with_config(GmwConfig::default())
    }

    /// Deterministic dealer, for reproducible tests
    pub fn seeded(seed: u64) -> Self {
        Self::with_config(GmwConfig {
            seed: Some(seed),
            ..Default::default()
        })
    }

    pub fn with_config(config: GmwConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        XorSharedRuntime {
            dealer: Mutex::new(rng),
            audit: if config.trace {
                Audit::with_trace()
            } else {
                Audit::new()
            },
            and_gates: AtomicU64::new(0),
            overflow: Mutex::new(SharedBit::public(false)),
        }
    }

    /// Beaver triples consumed so far
    pub fn and_gates(&self) -> u64 {
        self.and_gates.load(Ordering::Relaxed)
    }

    fn encode(value: f64) -> Result<u32> {
        if !value.is_finite()
            || value.fract() != 0.0
            || value < i32::MIN as f64
            || value > i32::MAX as f64
        {
            return Err(XtabsError::NonIntegral(value));
        }
        Ok(value as i32 as u32)
    }

    fn decode(word: u32) -> f64 {
        word as i32 as f64
    }

    fn dealer(&self) -> Result<MutexGuard<'_, StdRng>> {
        self.dealer
            .lock()
            .map_err(|_| XtabsError::Backend("dealer lock poisoned".to_string()))
    }

    fn overflow_flag(&self) -> Result<MutexGuard<'_, SharedBit>> {
        self.overflow
            .lock()
            .map_err(|_| XtabsError::Backend("overflow flag lock poisoned".to_string()))
    }

    fn share(rng: &mut StdRng, value: u32) -> SharedWord {
        let mask: u32 = rng.gen();
        SharedWord {
            alice: mask,
            bob: value ^ mask,
        }
    }

    /// Shared `(u, v, u & v)`
    fn triple(&self) -> Result<(SharedWord, SharedWord, SharedWord)> {
        let mut rng = self.dealer()?;
        let u: u32 = rng.gen();
        let v: u32 = rng.gen();
        Ok((
            Self::share(&mut rng, u),
            Self::share(&mut rng, v),
            Self::share(&mut rng, u & v),
        ))
    }

    /// Bitwise AND of two shared words, one triple
    fn and_words(&self, x: SharedWord, y: SharedWord) -> Result<SharedWord> {
        let (u, v, w) = self.triple()?;
        self.and_gates.fetch_add(1, Ordering::Relaxed);

        let d = x.xor(u).open();
        let e = y.xor(v).open();

        Ok(SharedWord {
            alice: w.alice ^ (d & v.alice) ^ (e & u.alice) ^ (d & e),
            bob: w.bob ^ (d & v.bob) ^ (e & u.bob),
        })
    }

    fn and_bits(&self, x: SharedBit, y: SharedBit) -> Result<SharedBit> {
        Ok(self
            .and_words(SharedWord::from_bit(x), SharedWord::from_bit(y))?
            .bit(0))
    }

    /// Ripple-carry `a + b + carry_in`, returning the carry out
    fn add_with_carry(
        &self,
        a: SharedWord,
        b: SharedWord,
        carry_in: SharedBit,
    ) -> Result<(SharedWord, SharedBit)> {
        let mut carry = carry_in;
        let mut sum = [SharedBit::default(); WORD_BITS];
        for (i, slot) in sum.iter_mut().enumerate() {
            let ai = a.bit(i);
            let bi = b.bit(i);
            *slot = ai.xor(bi).xor(carry);
            // majority(a, b, c) = c ^ ((a ^ c) & (b ^ c))
            carry = carry.xor(self.and_bits(ai.xor(carry), bi.xor(carry))?);
        }
        Ok((SharedWord::from_bits(&sum), carry))
    }

    fn add_words(&self, a: SharedWord, b: SharedWord) -> Result<SharedWord> {
        Ok(self.add_with_carry(a, b, SharedBit::public(false))?.0)
    }

    /// `a + b + carry_in` that also records signed overflow, two extra gates
    fn checked_add(
        &self,
        a: SharedWord,
        b: SharedWord,
        carry_in: SharedBit,
    ) -> Result<SharedWord> {
        let (sum, _) = self.add_with_carry(a, b, carry_in)?;
        let top = WORD_BITS - 1;
        let (a_sign, b_sign, s_sign) = (a.bit(top), b.bit(top), sum.bit(top));
        // operands agree in sign and the result does not
        let same_sign = a_sign.xor(b_sign).not();
        let wrapped = self.and_bits(same_sign, s_sign.xor(a_sign))?;

        let mut flag = self.overflow_flag()?;
        *flag = self.and_bits(flag.not(), wrapped.not())?.not();
        Ok(sum)
    }

    fn mux_words(
        &self,
        cond: SharedBit,
        if_true: SharedWord,
        if_false: SharedWord,
    ) -> Result<SharedWord> {
        let diff = self.and_words(SharedWord::spread(cond), if_true.xor(if_false))?;
        Ok(if_false.xor(diff))
    }
}

impl SecureOps for XorSharedRuntime {
    type Value = SharedWord;
    type Bit = SharedBit;

    fn constant(&self, value: f64) -> Result<SharedWord> {
        self.audit.record(OpKind::Constant)?;
        Ok(SharedWord::public(Self::encode(value)?))
    }

    fn constant_bit(&self, value: bool) -> Result<SharedBit> {
        self.audit.record(OpKind::Constant)?;
        Ok(SharedBit::public(value))
    }

    fn equal(&self, a: &SharedWord, b: &SharedWord) -> Result<SharedBit> {
        self.audit.record(OpKind::Equal)?;
        // fold the XNOR of all 32 bits down into bit 0
        let mut x = a.xor(*b).not();
        for shift in [16, 8, 4, 2, 1] {
            x = self.and_words(x, x.shr(shift))?;
        }
        Ok(x.bit(0))
    }

    fn less_equal(&self, a: &SharedWord, b: &SharedWord) -> Result<SharedBit> {
        self.audit.record(OpKind::LessEqual)?;
        // offset binary turns the signed comparison into an unsigned one;
        // a <= b iff b - a does not borrow, i.e. b + !a + 1 carries out
        let a = a.xor_public(SIGN_BIT);
        let b = b.xor_public(SIGN_BIT);
        let (_, carry) = self.add_with_carry(b, a.not(), SharedBit::public(true))?;
        Ok(carry)
    }

    fn and(&self, a: &SharedBit, b: &SharedBit) -> Result<SharedBit> {
        self.audit.record(OpKind::And)?;
        self.and_bits(*a, *b)
    }

    fn select(
        &self,
        cond: &SharedBit,
        if_true: &SharedWord,
        if_false: &SharedWord,
    ) -> Result<SharedWord> {
        self.audit.record(OpKind::Select)?;
        self.mux_words(*cond, *if_true, *if_false)
    }

    fn select_bit(
        &self,
        cond: &SharedBit,
        if_true: &SharedBit,
        if_false: &SharedBit,
    ) -> Result<SharedBit> {
        self.audit.record(OpKind::SelectBit)?;
        let diff = self.and_bits(*cond, if_true.xor(*if_false))?;
        Ok(if_false.xor(diff))
    }

    fn add(&self, a: &SharedWord, b: &SharedWord) -> Result<SharedWord> {
        self.audit.record(OpKind::Add)?;
        self.checked_add(*a, *b, SharedBit::public(false))
    }

    fn sub(&self, a: &SharedWord, b: &SharedWord) -> Result<SharedWord> {
        self.audit.record(OpKind::Sub)?;
        self.checked_add(*a, b.not(), SharedBit::public(true))
    }

    fn multiply(&self, a: &SharedWord, b: &SharedWord) -> Result<SharedWord> {
        self.audit.record(OpKind::Multiply)?;
        // shift-and-add, always all 32 partial products
        let mut acc = SharedWord::public(0);
        for i in 0..WORD_BITS {
            let partial = self.and_words(SharedWord::spread(b.bit(i)), a.shl(i))?;
            acc = self.add_words(acc, partial)?;
        }
        Ok(acc)
    }
}

impl SecureRuntime for XorSharedRuntime {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: BACKEND,
            fractional: false,
        }
    }

    fn input(&self, party: Party, value: f64) -> Result<SharedWord> {
        self.audit.record(OpKind::Input)?;
        let word = Self::encode(value)?;
        let mask: u32 = self.dealer()?.gen();
        trace!(party = %party, "xor-shared input");
        // the owner keeps the masked value and hands the mask to the peer
        Ok(match party {
            Party::Alice => SharedWord {
                alice: word ^ mask,
                bob: mask,
            },
            Party::Bob => SharedWord {
                alice: mask,
                bob: word ^ mask,
            },
        })
    }

    fn divide(&self, _numerator: &SharedWord, _denominator: &SharedWord) -> Result<SharedWord> {
        Err(XtabsError::UnsupportedOperation {
            backend: BACKEND,
            operation: "division".to_string(),
        })
    }

    fn sqrt(&self, _value: &SharedWord) -> Result<SharedWord> {
        Err(XtabsError::UnsupportedOperation {
            backend: BACKEND,
            operation: "square root".to_string(),
        })
    }

    fn reveal(&self, value: &SharedWord) -> Result<f64> {
        self.audit.record(OpKind::Reveal)?;
        Ok(Self::decode(value.open()))
    }

    fn reveal_bit(&self, bit: &SharedBit) -> Result<bool> {
        self.audit.record(OpKind::Reveal)?;
        Ok(bit.alice ^ bit.bob)
    }

    fn check_overflow(&self) -> Result<()> {
        self.audit.record(OpKind::Reveal)?;
        let mut flag = self.overflow_flag()?;
        let overflowed = flag.alice ^ flag.bob;
        *flag = SharedBit::public(false);
        if overflowed {
            return Err(XtabsError::Overflow { backend: BACKEND });
        }
        Ok(())
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(rt: &XorSharedRuntime, v: f64) -> SharedWord {
        rt.input(Party::Alice, v).unwrap()
    }

    #[test]
    fn test_shares_hide_value() {
        let rt = XorSharedRuntime::seeded(7);
        let w = shared(&rt, 42.0);
        assert_ne!(w.alice, 42);
        assert_eq!(w.alice ^ w.bob, 42);
        assert_eq!(rt.reveal(&w).unwrap(), 42.0);
    }

    #[test]
    fn test_arithmetic_with_negatives() {
        let rt = XorSharedRuntime::seeded(1);
        let a = shared(&rt, -17.0);
        let b = rt.input(Party::Bob, 5.0).unwrap();

        assert_eq!(rt.reveal(&rt.add(&a, &b).unwrap()).unwrap(), -12.0);
        assert_eq!(rt.reveal(&rt.sub(&a, &b).unwrap()).unwrap(), -22.0);
        assert_eq!(rt.reveal(&rt.sub(&b, &a).unwrap()).unwrap(), 22.0);
        assert_eq!(rt.reveal(&rt.multiply(&a, &b).unwrap()).unwrap(), -85.0);
        assert_eq!(rt.reveal(&rt.multiply(&a, &a).unwrap()).unwrap(), 289.0);
    }

    #[test]
    fn test_signed_comparisons() {
        let rt = XorSharedRuntime::seeded(2);
        let samples = [-2_147_483_648.0, -300.0, -1.0, 0.0, 1.0, 2.0, 300.0, 2_147_483_647.0];
        for &x in &samples {
            for &y in &samples {
                let a = shared(&rt, x);
                let b = rt.input(Party::Bob, y).unwrap();
                let le = rt.less_equal(&a, &b).unwrap();
                let eq = rt.equal(&a, &b).unwrap();
                assert_eq!(rt.reveal_bit(&le).unwrap(), x <= y, "{} <= {}", x, y);
                assert_eq!(rt.reveal_bit(&eq).unwrap(), x == y, "{} == {}", x, y);
            }
        }
    }

    #[test]
    fn test_select_and_bits() {
        let rt = XorSharedRuntime::seeded(3);
        let a = shared(&rt, 11.0);
        let b = shared(&rt, -4.0);
        let t = rt.less_equal(&b, &a).unwrap();
        let f = rt.equal(&a, &b).unwrap();

        assert_eq!(rt.reveal(&rt.select(&t, &a, &b).unwrap()).unwrap(), 11.0);
        assert_eq!(rt.reveal(&rt.select(&f, &a, &b).unwrap()).unwrap(), -4.0);
        assert!(!rt.reveal_bit(&rt.and(&t, &f).unwrap()).unwrap());
        assert!(rt.reveal_bit(&rt.select_bit(&t, &t, &f).unwrap()).unwrap());
        assert!(!rt.reveal_bit(&rt.select_bit(&f, &t, &f).unwrap()).unwrap());
    }

    #[test]
    fn test_gate_counts_are_fixed() {
        let rt = XorSharedRuntime::seeded(4);
        let a = shared(&rt, 3.0);
        let b = shared(&rt, 9.0);

        let start = rt.and_gates();
        rt.equal(&a, &b).unwrap();
        assert_eq!(rt.and_gates() - start, 5);

        let start = rt.and_gates();
        rt.less_equal(&a, &b).unwrap();
        assert_eq!(rt.and_gates() - start, WORD_BITS as u64);

        let start = rt.and_gates();
        rt.add(&a, &b).unwrap();
        assert_eq!(rt.and_gates() - start, WORD_BITS as u64 + 2);

        let start = rt.and_gates();
        rt.multiply(&a, &b).unwrap();
        assert_eq!(rt.and_gates() - start, (WORD_BITS * (WORD_BITS + 1)) as u64);
    }

    #[test]
    fn test_overflow_is_flagged_once() {
        let rt = XorSharedRuntime::seeded(6);
        let max = shared(&rt, 2_147_483_647.0);
        let min = shared(&rt, -2_147_483_648.0);
        let one = rt.input(Party::Bob, 1.0).unwrap();

        // in range, including a negative result
        rt.add(&min, &max).unwrap();
        rt.sub(&one, &max).unwrap();
        assert_eq!(rt.check_overflow(), Ok(()));

        // the word still wraps; the flag records it
        let wrapped = rt.add(&max, &one).unwrap();
        assert_eq!(rt.reveal(&wrapped).unwrap(), -2_147_483_648.0);
        assert_eq!(
            rt.check_overflow(),
            Err(XtabsError::Overflow { backend: "gmw" })
        );
        assert_eq!(rt.check_overflow(), Ok(()));

        rt.sub(&min, &one).unwrap();
        assert!(rt.check_overflow().is_err());
    }

    #[test]
    fn test_integer_domain_only() {
        let rt = XorSharedRuntime::seeded(5);
        assert_eq!(
            rt.input(Party::Alice, 1.5),
            Err(XtabsError::NonIntegral(1.5))
        );
        assert!(rt.constant(1e12).is_err());

        let a = shared(&rt, 4.0);
        assert!(matches!(
            rt.divide(&a, &a),
            Err(XtabsError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            rt.sqrt(&a),
            Err(XtabsError::UnsupportedOperation { .. })
        ));
        assert!(!rt.capabilities().fractional);
    }
}
