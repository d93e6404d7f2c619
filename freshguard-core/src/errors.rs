//! Error Types for the Alert Engine
//!
//! ## Design Philosophy
//!
//! Every error in this crate is a terminal outcome of one evaluation cycle.
//! Nothing here is used for control flow, and nothing here is allowed to
//! escape the polling loop. The types are split by the component that raises
//! them so callers can tell a configuration problem from a storage problem
//! without string matching.
//!
//! ## Error Categories
//!
//! ### Configuration
//! - `ThresholdError`: a threshold record breaks the ordering rule (danger
//!   must be strictly more extreme than warning) or carries a non-finite level
//! - `EvaluationError::MissingThresholds` / `MissingClassifier`: the evaluator
//!   was asked to run without its configuration
//!
//! ### Storage
//! - `LedgerError`: the durable ledger could not be read or persisted
//!
//! ## What is *not* an error
//!
//! Malformed sensor values are never raised. Non-numeric and non-finite
//! values are coerced to `0.0` when a [`Reading`](crate::Reading) is built.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use freshguard_core::{evaluate, EvaluationError, MemoryLedger, Reading};
//! use freshguard_core::thresholds::ThresholdTable;
//! use freshguard_core::traits::{Classification, ConditionClassifier};
//!
//! struct AlwaysFresh;
//! impl ConditionClassifier for AlwaysFresh {
//!     fn classify(&self, _: &Reading) -> Classification {
//!         Classification { is_bad: false, score: 0.0, confidence: 0.0, threshold: 0.0 }
//!     }
//! }
//!
//! let mut ledger = MemoryLedger::new();
//! let reading = Reading::new(1_700_000_000, []);
//!
//! match evaluate(&reading, None, Some(&AlwaysFresh), &mut ledger) {
//!     Err(EvaluationError::MissingThresholds) => {
//!         // refuse the cycle, report it, try again next tick
//!     }
//!     _ => unreachable!(),
//! }
//! ```

use thiserror::Error;

use crate::parameters::ParameterId;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type for evaluation cycles
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Invalid threshold configuration
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ThresholdError {
    /// Danger level is not strictly beyond the warning level in the triggering direction
    #[error("{parameter}: danger level {danger} is not more extreme than warning level {warning}")]
    NotMoreExtreme {
        /// Parameter whose record is invalid
        parameter: ParameterId,
        /// Configured warning level
        warning: f64,
        /// Configured danger level
        danger: f64,
    },

    /// A level is NaN or infinite
    #[error("{parameter}: threshold levels must be finite")]
    NonFinite {
        /// Parameter whose record is invalid
        parameter: ParameterId,
    },

    /// A record was placed in another parameter's slot
    #[error("threshold record for {found} filed under {expected}")]
    Misfiled {
        /// Slot being filled
        expected: ParameterId,
        /// Parameter the record was built for
        found: ParameterId,
    },
}

/// Durable ledger failures
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Underlying file could not be read, written or synced
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A journal line is not a JSON string, or an export is not an object of booleans
    #[error("ledger file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Reasons an evaluation cycle is refused or aborted
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// No threshold table configured
    #[error("threshold table is not configured; refusing to evaluate")]
    MissingThresholds,

    /// No classifier model configured
    #[error("classifier model is not configured; refusing to evaluate")]
    MissingClassifier,

    /// Ledger could not record an alert key
    #[error("alert ledger write failed: {0}")]
    Ledger(#[from] LedgerError),
}
