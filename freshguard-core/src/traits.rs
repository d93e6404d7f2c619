//! Core traits at the engine's seams
//!
//! The evaluator depends on two collaborators it does not implement:
//! something that classifies a reading, and somewhere to remember which
//! alerts were already surfaced. Keep them small - the evaluator calls
//! each one a handful of times per cycle.

use serde::Serialize;

use crate::alerts::AlertKey;
use crate::errors::LedgerResult;
use crate::parameters::Reading;

/// Outcome of classifying one reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    /// Whether the adverse condition (spoiled) was detected
    pub is_bad: bool,
    /// Raw model score
    pub score: f64,
    /// Heuristic margin figure in `[0, 100]`; not a probability
    pub confidence: f64,
    /// Decision threshold the score was compared against
    pub threshold: f64,
}

/// Binary condition classifier over a whole reading
///
/// Implementations must be pure: the same reading always yields the same
/// classification, so re-evaluating a reading after a ledger miss produces
/// the same alerts as the first time.
pub trait ConditionClassifier {
    /// Classify a reading
    fn classify(&self, reading: &Reading) -> Classification;
}

impl<C: ConditionClassifier + ?Sized> ConditionClassifier for &C {
    fn classify(&self, reading: &Reading) -> Classification {
        (**self).classify(reading)
    }
}

/// Durable idempotency store of surfaced alert keys
///
/// Once `mark` returns `Ok`, `has` returns `true` for that key for every
/// later caller in the process. Keys are never removed.
pub trait AlertLedger {
    /// Whether `key` was already marked
    fn has(&self, key: &AlertKey) -> bool;

    /// Record `key`; marking an existing key is a no-op
    fn mark(&mut self, key: &AlertKey) -> LedgerResult<()>;

    /// Number of stored keys
    fn len(&self) -> usize;

    /// True when nothing has been marked yet
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
