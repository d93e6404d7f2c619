//! Engine Constants
//!
//! Operational defaults shared by the evaluator, the dispatcher and the
//! polling loop. Threshold levels for the shipped table live in
//! [`crate::thresholds::ThresholdTable::default`] next to the records they
//! populate.

use std::time::Duration;

/// How often the polling loop asks the data source for readings.
///
/// Sensor nodes push a reading roughly every 15-30 seconds; polling at the
/// lower bound keeps detection latency under one reporting period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Minimum spacing between two email-class notifications.
pub const EMAIL_COOLDOWN: Duration = Duration::from_secs(60);

/// Divisor applied to the classifier margin to produce a confidence figure.
pub const CONFIDENCE_DIVISOR: f64 = 10.0;

/// Upper bound of the classifier confidence figure.
pub const CONFIDENCE_CAP: f64 = 100.0;

/// Value substituted for non-numeric or non-finite sensor input.
pub const MALFORMED_VALUE_DEFAULT: f64 = 0.0;

/// Ledger key prefix marking a reading as fully processed.
pub const READING_KEY_PREFIX: &str = "reading_";

/// Ledger key prefix for the classifier alert.
pub const FRUIT_KEY_PREFIX: &str = "fruit_classification_";
