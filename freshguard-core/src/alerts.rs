//! Alerts and their deduplication identity
//!
//! An [`Alert`] is computed fresh on every evaluation and never stored. What
//! is stored is its [`AlertKey`], the one identity the ledger deduplicates on.
//! The key formats are stable and shared with older dashboard exports:
//!
//! ```text
//! ch4_danger_1700000000          parameter alert
//! fruit_classification_1700000000  classifier alert
//! reading_1700000000             reading fully processed
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{FRUIT_KEY_PREFIX, READING_KEY_PREFIX};
use crate::parameters::ParameterId;
use crate::thresholds::Direction;

/// Alert severity, ordered so that `Danger > Warning`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning level crossed
    Warning,
    /// Danger level crossed
    Danger,
}

impl Severity {
    /// Lowercase form used in ledger keys
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }

    /// Uppercase form used in notification text
    pub const fn as_upper(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Danger => "DANGER",
        }
    }

    /// Highest severity in a set, `None` when empty
    pub fn highest<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Option<Severity> {
        alerts.into_iter().map(|a| a.severity).max()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_upper())
    }
}

/// What condition an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A parameter crossed one of its levels
    Parameter(ParameterId),
    /// The classifier judged the produce spoiled
    FruitStatus,
}

/// One detected condition for one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Condition being reported
    pub kind: AlertKind,
    /// Warning or danger
    pub severity: Severity,
    /// Observed value (classifier score for `FruitStatus`)
    pub value: f64,
    /// Level that was crossed (classifier threshold for `FruitStatus`)
    pub threshold_crossed: f64,
    /// Which side of the level is adverse
    pub direction: Direction,
    /// Timestamp of the reading that produced the alert
    pub reading_timestamp: u64,
}

impl Alert {
    /// Deduplication identity of this alert
    pub fn key(&self) -> AlertKey {
        AlertKey::for_alert(self.kind, self.severity, self.reading_timestamp)
    }

    /// Parameter this alert is about, if any
    pub fn parameter(&self) -> Option<ParameterId> {
        match self.kind {
            AlertKind::Parameter(id) => Some(id),
            AlertKind::FruitStatus => None,
        }
    }
}

/// Ledger identity of an alert or of a processed reading
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertKey(String);

impl AlertKey {
    /// Key for an alert of `kind` at `severity` on reading `timestamp`
    pub fn for_alert(kind: AlertKind, severity: Severity, timestamp: u64) -> Self {
        match kind {
            AlertKind::Parameter(id) => {
                Self(format!("{}_{}_{}", id.as_str(), severity.as_str(), timestamp))
            }
            AlertKind::FruitStatus => Self::fruit_classification(timestamp),
        }
    }

    /// Key for the classifier outcome on reading `timestamp`
    pub fn fruit_classification(timestamp: u64) -> Self {
        Self(format!("{FRUIT_KEY_PREFIX}{timestamp}"))
    }

    /// Marker for a fully processed reading
    pub fn reading(timestamp: u64) -> Self {
        Self(format!("{READING_KEY_PREFIX}{timestamp}"))
    }

    /// Wrap a stored key verbatim
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Stored form of the key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `reading_<ts>` markers
    pub fn is_reading_marker(&self) -> bool {
        self.0.starts_with(READING_KEY_PREFIX)
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AlertKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
