//! Threshold Evaluation
//!
//! ## Overview
//!
//! Turns one [`Reading`] into the set of alerts it raises, and splits that
//! set into alerts the user has already been told about and alerts that are
//! new. The split is decided by the [`AlertLedger`] alone.
//!
//! ## Ordering
//!
//! 1. Configuration is checked before anything else; a missing table or
//!    classifier refuses the cycle without touching the ledger
//! 2. Parameters are evaluated in [`ParameterId::ALL`] order, danger first
//! 3. The classifier runs once on the whole reading
//! 4. Each candidate key is marked as soon as it is found to be new
//! 5. `reading_<ts>` is marked last, whether or not anything fired
//!
//! Because new keys are written before the caller sees them, a crash between
//! evaluation and dispatch loses notifications instead of repeating them.
//!
//! ## Example
//!
//! ```rust
//! use freshguard_core::{evaluate, MemoryLedger, ParameterId, Reading};
//! use freshguard_core::thresholds::ThresholdTable;
//! use freshguard_core::traits::{Classification, ConditionClassifier};
//!
//! struct AlwaysFresh;
//! impl ConditionClassifier for AlwaysFresh {
//!     fn classify(&self, _: &Reading) -> Classification {
//!         Classification { is_bad: false, score: -1.0, confidence: 0.1, threshold: 0.0 }
//!     }
//! }
//!
//! let table = ThresholdTable::default();
//! let mut ledger = MemoryLedger::new();
//! let reading = Reading::new(100, [(ParameterId::Ch4, 1750.0)]);
//!
//! let first = evaluate(&reading, Some(&table), Some(&AlwaysFresh), &mut ledger).unwrap();
//! assert_eq!(first.new.len(), 1);
//!
//! let again = evaluate(&reading, Some(&table), Some(&AlwaysFresh), &mut ledger).unwrap();
//! assert!(again.new.is_empty());
//! assert_eq!(again.active.len(), 1);
//! ```

use serde::Serialize;

use crate::alerts::{Alert, AlertKey, AlertKind, Severity};
use crate::errors::{EvaluationError, EvaluationResult};
use crate::parameters::{ParameterId, Reading};
use crate::thresholds::{Direction, ThresholdTable};
use crate::traits::{AlertLedger, Classification, ConditionClassifier};

/// Result of evaluating one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Timestamp of the evaluated reading
    pub reading_timestamp: u64,
    /// Every alert the reading raises, new or not
    pub active: Vec<Alert>,
    /// Alerts whose key was not in the ledger before this call
    pub new: Vec<Alert>,
    /// Classifier outcome for the reading
    pub classification: Classification,
}

impl Evaluation {
    /// Whether any alert was newly recorded
    pub fn has_new(&self) -> bool {
        !self.new.is_empty()
    }
}

/// Compute the alerts a reading raises without consulting any ledger
pub fn detect<C>(reading: &Reading, table: &ThresholdTable, classifier: &C) -> (Vec<Alert>, Classification)
where
    C: ConditionClassifier + ?Sized,
{
    let timestamp = reading.timestamp();
    let mut alerts = Vec::new();

    for id in ParameterId::ALL {
        let Some(value) = reading.value(id) else {
            continue;
        };

        let spec = table.get(id);
        if let Some((severity, level)) = spec.classify(value) {
            alerts.push(Alert {
                kind: AlertKind::Parameter(id),
                severity,
                value,
                threshold_crossed: level,
                direction: spec.direction(),
                reading_timestamp: timestamp,
            });
        }
    }

    let classification = classifier.classify(reading);
    if classification.is_bad {
        alerts.push(Alert {
            kind: AlertKind::FruitStatus,
            severity: Severity::Danger,
            value: classification.score,
            threshold_crossed: classification.threshold,
            direction: Direction::AboveIsBad,
            reading_timestamp: timestamp,
        });
    }

    (alerts, classification)
}

/// Evaluate a reading and record every new alert in the ledger
///
/// # Errors
///
/// - [`EvaluationError::MissingThresholds`] / [`EvaluationError::MissingClassifier`]
///   when configuration is absent; the ledger is untouched
/// - [`EvaluationError::Ledger`] when a key cannot be persisted; keys marked
///   before the failure stay marked
pub fn evaluate<C, L>(
    reading: &Reading,
    table: Option<&ThresholdTable>,
    classifier: Option<&C>,
    ledger: &mut L,
) -> EvaluationResult<Evaluation>
where
    C: ConditionClassifier + ?Sized,
    L: AlertLedger + ?Sized,
{
    let table = table.ok_or(EvaluationError::MissingThresholds)?;
    let classifier = classifier.ok_or(EvaluationError::MissingClassifier)?;

    let (active, classification) = detect(reading, table, classifier);

    let mut new = Vec::new();
    for alert in &active {
        let key = alert.key();
        if ledger.has(&key) {
            log::trace!("alert {} already recorded", key);
            continue;
        }

        ledger.mark(&key)?;
        log::debug!("recorded new alert {}", key);
        new.push(alert.clone());
    }

    ledger.mark(&AlertKey::reading(reading.timestamp()))?;

    Ok(Evaluation {
        reading_timestamp: reading.timestamp(),
        active,
        new,
        classification,
    })
}
