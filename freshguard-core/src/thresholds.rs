//! Direction-Aware Threshold Table
//!
//! ## Overview
//!
//! Each monitored parameter has two alert levels, warning and danger, and a
//! direction saying which side of a level is adverse:
//!
//! ```text
//! AboveIsBad (ch4, voc, etoh, temperature, humidity)
//!   ───────────────┬────────────────┬───────────────▶ value
//!        normal    │    WARNING     │    DANGER
//!               warning           danger
//!
//! BelowIsBad (mq135)
//!   ◀──────────────┬────────────────┬─────────────── value
//!        normal    │    WARNING     │    DANGER
//!               warning           danger
//! ```
//!
//! A level is crossed inclusively: `value >= level` above, `value <= level`
//! below.
//!
//! ## Ordering Rule
//!
//! Danger must be strictly more extreme than warning in the adverse
//! direction. A record where the two coincide, or where danger sits on the
//! benign side of warning, can never produce one of its two severities, so
//! it is rejected at construction and at deserialization rather than
//! silently misbehaving.
//!
//! ## Precedence
//!
//! [`ThresholdSpec::classify`] checks danger first. A value past both levels
//! yields exactly one `Danger`, never a `Warning` as well.

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::alerts::Severity;
use crate::errors::ThresholdError;
use crate::parameters::ParameterId;

/// Which side of a level is adverse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// `value >= level` triggers
    AboveIsBad,
    /// `value <= level` triggers
    BelowIsBad,
}

impl Direction {
    /// Whether `value` has reached `level` on the adverse side
    pub fn crosses(&self, value: f64, level: f64) -> bool {
        match self {
            Direction::AboveIsBad => value >= level,
            Direction::BelowIsBad => value <= level,
        }
    }

    /// Verb used in notification text
    pub const fn verb(&self) -> &'static str {
        match self {
            Direction::AboveIsBad => "exceeds",
            Direction::BelowIsBad => "falls below",
        }
    }
}

/// Warning/danger levels for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholdSpec")]
pub struct ThresholdSpec {
    parameter: ParameterId,
    warning: f64,
    danger: f64,
    direction: Direction,
}

/// Unchecked form used for deserialization
#[derive(Deserialize)]
struct RawThresholdSpec {
    parameter: ParameterId,
    warning: f64,
    danger: f64,
    direction: Direction,
}

impl TryFrom<RawThresholdSpec> for ThresholdSpec {
    type Error = ThresholdError;

    fn try_from(raw: RawThresholdSpec) -> Result<Self, Self::Error> {
        ThresholdSpec::new(raw.parameter, raw.warning, raw.danger, raw.direction)
    }
}

impl ThresholdSpec {
    /// Create a record, enforcing finiteness and the ordering rule
    pub fn new(
        parameter: ParameterId,
        warning: f64,
        danger: f64,
        direction: Direction,
    ) -> Result<Self, ThresholdError> {
        if !warning.is_finite() || !danger.is_finite() {
            return Err(ThresholdError::NonFinite { parameter });
        }

        let more_extreme = match direction {
            Direction::AboveIsBad => danger > warning,
            Direction::BelowIsBad => danger < warning,
        };
        if !more_extreme {
            return Err(ThresholdError::NotMoreExtreme {
                parameter,
                warning,
                danger,
            });
        }

        Ok(Self {
            parameter,
            warning,
            danger,
            direction,
        })
    }

    /// Parameter this record applies to
    pub fn parameter(&self) -> ParameterId {
        self.parameter
    }

    /// Warning level
    pub fn warning(&self) -> f64 {
        self.warning
    }

    /// Danger level
    pub fn danger(&self) -> f64 {
        self.danger
    }

    /// Adverse side of both levels
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Severity reached by `value` and the level it crossed
    ///
    /// Danger is checked before warning.
    pub fn classify(&self, value: f64) -> Option<(Severity, f64)> {
        if self.direction.crosses(value, self.danger) {
            Some((Severity::Danger, self.danger))
        } else if self.direction.crosses(value, self.warning) {
            Some((Severity::Warning, self.warning))
        } else {
            None
        }
    }
}

/// One threshold record per parameter
///
/// Every [`ParameterId`] variant has a field, so a lookup can never miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholdTable")]
pub struct ThresholdTable {
    ch4: ThresholdSpec,
    mq135: ThresholdSpec,
    voc: ThresholdSpec,
    etoh: ThresholdSpec,
    temperature: ThresholdSpec,
    humidity: ThresholdSpec,
}

/// Wire form: each record's `parameter` is implied by its field name
#[derive(Deserialize)]
struct RawThresholdTable {
    ch4: LevelPair,
    mq135: LevelPair,
    voc: LevelPair,
    etoh: LevelPair,
    temperature: LevelPair,
    humidity: LevelPair,
}

#[derive(Deserialize)]
struct LevelPair {
    warning: f64,
    danger: f64,
    direction: Direction,
}

impl TryFrom<RawThresholdTable> for ThresholdTable {
    type Error = ThresholdError;

    fn try_from(raw: RawThresholdTable) -> Result<Self, Self::Error> {
        let spec = |parameter, pair: LevelPair| {
            ThresholdSpec::new(parameter, pair.warning, pair.danger, pair.direction)
        };

        Ok(Self {
            ch4: spec(ParameterId::Ch4, raw.ch4)?,
            mq135: spec(ParameterId::Mq135, raw.mq135)?,
            voc: spec(ParameterId::Voc, raw.voc)?,
            etoh: spec(ParameterId::Etoh, raw.etoh)?,
            temperature: spec(ParameterId::Temperature, raw.temperature)?,
            humidity: spec(ParameterId::Humidity, raw.humidity)?,
        })
    }
}

impl ThresholdTable {
    /// Build a table from one record per parameter
    ///
    /// Records must be given in [`ParameterId::ALL`] order; a record filed
    /// under another parameter's slot is rejected.
    pub fn new(records: [ThresholdSpec; 6]) -> Result<Self, ThresholdError> {
        for (record, expected) in records.iter().zip(ParameterId::ALL) {
            if record.parameter != expected {
                return Err(ThresholdError::Misfiled {
                    expected,
                    found: record.parameter,
                });
            }
        }

        let [ch4, mq135, voc, etoh, temperature, humidity] = records;
        Ok(Self {
            ch4,
            mq135,
            voc,
            etoh,
            temperature,
            humidity,
        })
    }

    /// Record for `parameter`
    pub fn get(&self, parameter: ParameterId) -> &ThresholdSpec {
        match parameter {
            ParameterId::Ch4 => &self.ch4,
            ParameterId::Mq135 => &self.mq135,
            ParameterId::Voc => &self.voc,
            ParameterId::Etoh => &self.etoh,
            ParameterId::Temperature => &self.temperature,
            ParameterId::Humidity => &self.humidity,
        }
    }

    /// Replace the record for its parameter
    pub fn with(mut self, spec: ThresholdSpec) -> Self {
        let slot = match spec.parameter {
            ParameterId::Ch4 => &mut self.ch4,
            ParameterId::Mq135 => &mut self.mq135,
            ParameterId::Voc => &mut self.voc,
            ParameterId::Etoh => &mut self.etoh,
            ParameterId::Temperature => &mut self.temperature,
            ParameterId::Humidity => &mut self.humidity,
        };
        *slot = spec;
        self
    }

    /// All records in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = &ThresholdSpec> {
        ParameterId::ALL.into_iter().map(move |p| self.get(p))
    }
}

impl Default for ThresholdTable {
    /// Levels used by the produce-storage deployment.
    ///
    /// The gas levels come from the sensor calibration sheets. Temperature and
    /// humidity are deliberately loose: they only flag conditions where the
    /// storage unit itself has failed.
    fn default() -> Self {
        use Direction::{AboveIsBad, BelowIsBad};

        let fixed = |parameter, warning, danger, direction| ThresholdSpec {
            parameter,
            warning,
            danger,
            direction,
        };

        Self {
            ch4: fixed(ParameterId::Ch4, 1200.0, 1700.0, AboveIsBad),
            mq135: fixed(ParameterId::Mq135, 240.0, 100.0, BelowIsBad),
            voc: fixed(ParameterId::Voc, 1000.0, 1100.0, AboveIsBad),
            etoh: fixed(ParameterId::Etoh, 400.0, 600.0, AboveIsBad),
            temperature: fixed(ParameterId::Temperature, 45.0, 50.0, AboveIsBad),
            humidity: fixed(ParameterId::Humidity, 100.0, 110.0, AboveIsBad),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_is_bad_levels() {
        let table = ThresholdTable::default();
        let ch4 = table.get(ParameterId::Ch4);

        assert_eq!(ch4.classify(1750.0), Some((Severity::Danger, 1700.0)));
        assert_eq!(ch4.classify(1300.0), Some((Severity::Warning, 1200.0)));
        assert_eq!(ch4.classify(500.0), None);
    }

    #[test]
    fn levels_are_inclusive() {
        let ch4 = *ThresholdTable::default().get(ParameterId::Ch4);
        assert_eq!(ch4.classify(1700.0), Some((Severity::Danger, 1700.0)));
        assert_eq!(ch4.classify(1200.0), Some((Severity::Warning, 1200.0)));
    }

    #[test]
    fn below_is_bad_levels() {
        let table = ThresholdTable::default();
        let mq135 = table.get(ParameterId::Mq135);

        assert_eq!(mq135.classify(100.0), Some((Severity::Danger, 100.0)));
        assert_eq!(mq135.classify(200.0), Some((Severity::Warning, 240.0)));
        assert_eq!(mq135.classify(400.0), None);
    }

    #[test]
    fn rejects_danger_not_beyond_warning() {
        let equal = ThresholdSpec::new(ParameterId::Temperature, 50.0, 50.0, Direction::AboveIsBad);
        assert!(matches!(equal, Err(ThresholdError::NotMoreExtreme { .. })));

        let inverted = ThresholdSpec::new(ParameterId::Mq135, 100.0, 240.0, Direction::BelowIsBad);
        assert!(matches!(inverted, Err(ThresholdError::NotMoreExtreme { .. })));
    }

    #[test]
    fn rejects_non_finite_levels() {
        let result = ThresholdSpec::new(ParameterId::Voc, f64::NAN, 10.0, Direction::AboveIsBad);
        assert_eq!(result, Err(ThresholdError::NonFinite { parameter: ParameterId::Voc }));
    }

    #[test]
    fn default_table_satisfies_ordering_rule() {
        for spec in ThresholdTable::default().iter() {
            let rebuilt = ThresholdSpec::new(spec.parameter(), spec.warning(), spec.danger(), spec.direction());
            assert_eq!(rebuilt.as_ref(), Ok(spec));
        }
    }

    #[test]
    fn table_from_json() {
        let json = r#"{
            "ch4":         {"warning": 1000, "danger": 1500, "direction": "above_is_bad"},
            "mq135":       {"warning": 240,  "danger": 100,  "direction": "below_is_bad"},
            "voc":         {"warning": 1000, "danger": 1100, "direction": "above_is_bad"},
            "etoh":        {"warning": 400,  "danger": 600,  "direction": "above_is_bad"},
            "temperature": {"warning": 45,   "danger": 50,   "direction": "above_is_bad"},
            "humidity":    {"warning": 100,  "danger": 110,  "direction": "above_is_bad"}
        }"#;
        let table: ThresholdTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.get(ParameterId::Ch4).warning(), 1000.0);
        assert_eq!(table.get(ParameterId::Ch4).parameter(), ParameterId::Ch4);
    }

    #[test]
    fn table_from_json_rejects_bad_ordering() {
        let json = r#"{
            "ch4":         {"warning": 1500, "danger": 1000, "direction": "above_is_bad"},
            "mq135":       {"warning": 240,  "danger": 100,  "direction": "below_is_bad"},
            "voc":         {"warning": 1000, "danger": 1100, "direction": "above_is_bad"},
            "etoh":        {"warning": 400,  "danger": 600,  "direction": "above_is_bad"},
            "temperature": {"warning": 45,   "danger": 50,   "direction": "above_is_bad"},
            "humidity":    {"warning": 100,  "danger": 110,  "direction": "above_is_bad"}
        }"#;
        assert!(serde_json::from_str::<ThresholdTable>(json).is_err());
    }

    #[test]
    fn with_replaces_single_record() {
        let spec = ThresholdSpec::new(ParameterId::Etoh, 300.0, 500.0, Direction::AboveIsBad).unwrap();
        let table = ThresholdTable::default().with(spec);
        assert_eq!(table.get(ParameterId::Etoh).warning(), 300.0);
        assert_eq!(table.get(ParameterId::Ch4).warning(), 1200.0);
    }

    #[test]
    fn new_rejects_misfiled_record() {
        let defaults = ThresholdTable::default();
        let mut records: [ThresholdSpec; 6] = [
            *defaults.get(ParameterId::Ch4),
            *defaults.get(ParameterId::Mq135),
            *defaults.get(ParameterId::Voc),
            *defaults.get(ParameterId::Etoh),
            *defaults.get(ParameterId::Temperature),
            *defaults.get(ParameterId::Humidity),
        ];
        assert!(ThresholdTable::new(records).is_ok());

        records.swap(0, 2);
        assert_eq!(
            ThresholdTable::new(records),
            Err(ThresholdError::Misfiled {
                expected: ParameterId::Ch4,
                found: ParameterId::Voc,
            })
        );
    }
}
