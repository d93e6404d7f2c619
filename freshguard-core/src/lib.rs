//! Core alert engine for FreshGuard
//!
//! Decides, for each sensor reading from a produce-storage node, which
//! conditions need attention and which of those are news to the user.
//!
//! Key properties:
//! - The same reading delivered twice never produces a second alert
//! - Danger always wins over warning for the same parameter
//! - Malformed sensor values are coerced, never raised
//!
//! ```no_run
//! use freshguard_core::{evaluate, FileLedger, ParameterId, Reading};
//! use freshguard_core::thresholds::ThresholdTable;
//! # use freshguard_core::traits::{Classification, ConditionClassifier};
//! # struct Model;
//! # impl ConditionClassifier for Model {
//! #     fn classify(&self, _: &Reading) -> Classification {
//! #         Classification { is_bad: false, score: 0.0, confidence: 0.0, threshold: 0.0 }
//! #     }
//! # }
//! # let model = Model;
//!
//! let table = ThresholdTable::default();
//! let mut ledger = FileLedger::open("freshguard-ledger.jsonl")?;
//!
//! let reading = Reading::new(1_700_000_000, [(ParameterId::Ch4, 1750.0)]);
//! let evaluation = evaluate(&reading, Some(&table), Some(&model), &mut ledger)?;
//!
//! for alert in &evaluation.new {
//!     // hand off to the notification dispatcher
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod alerts;
pub mod constants;
pub mod errors;
pub mod evaluator;
pub mod ledger;
pub mod parameters;
pub mod thresholds;
pub mod time;
pub mod traits;

// Public API
pub use alerts::{Alert, AlertKey, AlertKind, Severity};
pub use errors::{EvaluationError, EvaluationResult, LedgerError, LedgerResult, ThresholdError};
pub use evaluator::{detect, evaluate, Evaluation};
pub use ledger::{FileLedger, MemoryLedger};
pub use parameters::{ParameterId, ParameterMap, Reading};
pub use thresholds::{Direction, ThresholdSpec, ThresholdTable};
pub use traits::{AlertLedger, Classification, ConditionClassifier};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
