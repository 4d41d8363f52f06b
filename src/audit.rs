//! Operation accounting for secure runtimes
//!
//! Every primitive a runtime executes is recorded here. The tally lets callers
//! check that the cost of a query is a function of its public parameters only,
//! and the optional trace fingerprint hashes the exact sequence of primitives,
//! so two runs over different secret data with the same shape must agree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, XtabsError};

/// Kinds of primitive invocations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Constant,
    Input,
    Equal,
    LessEqual,
    And,
    Select,
    SelectBit,
    Add,
    Sub,
    Multiply,
    Divide,
    Sqrt,
    Reveal,
}

impl OpKind {
    pub const ALL: [OpKind; 13] = [
        OpKind::Constant,
        OpKind::Input,
        OpKind::Equal,
        OpKind::LessEqual,
        OpKind::And,
        OpKind::Select,
        OpKind::SelectBit,
        OpKind::Add,
        OpKind::Sub,
        OpKind::Multiply,
        OpKind::Divide,
        OpKind::Sqrt,
        OpKind::Reveal,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Snapshot of primitive counts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpTally {
    pub constant: u64,
    pub input: u64,
    pub equal: u64,
    pub less_equal: u64,
    pub and: u64,
    pub select: u64,
    pub select_bit: u64,
    pub add: u64,
    pub sub: u64,
    pub multiply: u64,
    pub divide: u64,
    pub sqrt: u64,
    pub reveal: u64,
}

impl OpTally {
    pub fn get(&self, kind: OpKind) -> u64 {
        match kind {
            OpKind::Constant => self.constant,
            OpKind::Input => self.input,
            OpKind::Equal => self.equal,
            OpKind::LessEqual => self.less_equal,
            OpKind::And => self.and,
            OpKind::Select => self.select,
            OpKind::SelectBit => self.select_bit,
            OpKind::Add => self.add,
            OpKind::Sub => self.sub,
            OpKind::Multiply => self.multiply,
            OpKind::Divide => self.divide,
            OpKind::Sqrt => self.sqrt,
            OpKind::Reveal => self.reveal,
        }
    }

    /// Total number of primitives, constants included
    pub fn total(&self) -> u64 {
        OpKind::ALL.iter().map(|k| self.get(*k)).sum()
    }

    /// Counts accumulated since an earlier snapshot
    pub fn since(&self, earlier: &OpTally) -> OpTally {
        OpTally {
            constant: self.constant - earlier.constant,
            input: self.input - earlier.input,
            equal: self.equal - earlier.equal,
            less_equal: self.less_equal - earlier.less_equal,
            and: self.and - earlier.and,
            select: self.select - earlier.select,
            select_bit: self.select_bit - earlier.select_bit,
            add: self.add - earlier.add,
            sub: self.sub - earlier.sub,
            multiply: self.multiply - earlier.multiply,
            divide: self.divide - earlier.divide,
            sqrt: self.sqrt - earlier.sqrt,
            reveal: self.reveal - earlier.reveal,
        }
    }
}

/// Counters and trace hasher owned by a runtime
#[derive(Debug)]
pub struct Audit {
    counters: [AtomicU64; 13],
    trace: Option<Mutex<Sha256>>,
}

impl Default for Audit {
    fn default() -> Self {
        Self::new()
    }
}

impl Audit {
    /// Counting only
    pub fn new() -> Self {
        Audit {
            counters: Default::default(),
            trace: None,
        }
    }

    /// Counting plus a running hash of the primitive sequence
    ///
    /// The sequence is only reproducible for single-shard scans; parallel
    /// shards interleave nondeterministically.
    pub fn with_trace() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"XTABS_OP_TRACE");
        Audit {
            counters: Default::default(),
            trace: Some(Mutex::new(hasher)),
        }
    }

    pub fn record(&self, kind: OpKind) -> Result<()> {
        self.counters[kind.index()].fetch_add(1, Ordering::Relaxed);
        if let Some(trace) = &self.trace {
            let mut hasher = trace
                .lock()
                .map_err(|_| XtabsError::Backend("operation trace lock poisoned".to_string()))?;
            hasher.update([kind.index() as u8]);
        }
        Ok(())
    }

    pub fn tally(&self) -> OpTally {
        let c = |k: OpKind| self.counters[k.index()].load(Ordering::Relaxed);
        OpTally {
            constant: c(OpKind::Constant),
            input: c(OpKind::Input),
            equal: c(OpKind::Equal),
            less_equal: c(OpKind::LessEqual),
            and: c(OpKind::And),
            select: c(OpKind::Select),
            select_bit: c(OpKind::SelectBit),
            add: c(OpKind::Add),
            sub: c(OpKind::Sub),
            multiply: c(OpKind::Multiply),
            divide: c(OpKind::Divide),
            sqrt: c(OpKind::Sqrt),
            reveal: c(OpKind::Reveal),
        }
    }

    /// Hex digest of the primitive sequence so far, if tracing is enabled
    pub fn fingerprint(&self) -> Result<Option<String>> {
        match &self.trace {
            None => Ok(None),
            Some(trace) => {
                let hasher = trace
                    .lock()
                    .map_err(|_| XtabsError::Backend("operation trace lock poisoned".to_string()))?;
                let digest = hasher.clone().finalize();
                Ok(Some(digest.iter().map(|b| format!("{:02x}", b)).collect()))
            }
        }
    }
}
