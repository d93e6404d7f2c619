//! Monitored Parameters and Sensor Readings
//!
//! ## Overview
//!
//! A [`Reading`] is one timestamped snapshot of every parameter the sensor
//! node reports. The set of parameters is closed: [`ParameterId`] is an enum,
//! so every table keyed by parameter (thresholds, classifier weights, email
//! template fields) is resolved by exhaustive matching instead of string
//! lookup. Adding a sensor means adding a variant, and the compiler then
//! points at every table that needs a new entry.
//!
//! ## Parameters
//!
//! | Id            | Sensor                 | Unit | Adverse direction |
//! |---------------|------------------------|------|-------------------|
//! | `ch4`         | MQ-4 methane           | ppm  | high              |
//! | `mq135`       | MQ-135 air quality     | ppm  | low               |
//! | `voc`         | VOC index              | ppb  | high              |
//! | `etoh`        | ethanol                | ppm  | high              |
//! | `temperature` | ambient temperature    | °C   | high              |
//! | `humidity`    | relative humidity      | %    | high              |
//!
//! ## Lenient Ingestion
//!
//! Readings come from devices that occasionally publish garbage: `null`,
//! empty strings, `"nan"`. None of that is an error here. Any present value
//! that is not a finite number becomes
//! [`MALFORMED_VALUE_DEFAULT`](crate::constants::MALFORMED_VALUE_DEFAULT)
//! before any comparison happens. Absent parameters stay absent and are
//! simply not evaluated.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::MALFORMED_VALUE_DEFAULT;

/// Parameter values keyed by parameter, iterated in declaration order
pub type ParameterMap = BTreeMap<ParameterId, f64>;

/// Monitored parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterId {
    /// Methane concentration
    Ch4,
    /// MQ-135 air quality sensor
    Mq135,
    /// Volatile organic compounds
    Voc,
    /// Ethanol concentration
    Etoh,
    /// Ambient temperature
    Temperature,
    /// Relative humidity
    Humidity,
}

impl ParameterId {
    /// Every parameter, in evaluation order
    pub const ALL: [ParameterId; 6] = [
        ParameterId::Ch4,
        ParameterId::Mq135,
        ParameterId::Voc,
        ParameterId::Etoh,
        ParameterId::Temperature,
        ParameterId::Humidity,
    ];

    /// Wire name, also used in ledger keys and template fields
    pub const fn as_str(&self) -> &'static str {
        match self {
            ParameterId::Ch4 => "ch4",
            ParameterId::Mq135 => "mq135",
            ParameterId::Voc => "voc",
            ParameterId::Etoh => "etoh",
            ParameterId::Temperature => "temperature",
            ParameterId::Humidity => "humidity",
        }
    }

    /// Human-readable label for notifications
    pub const fn label(&self) -> &'static str {
        match self {
            ParameterId::Ch4 => "Methane (CH₄)",
            ParameterId::Mq135 => "MQ135 Sensor",
            ParameterId::Voc => "Volatile Organic Compounds (VOC)",
            ParameterId::Etoh => "Ethanol",
            ParameterId::Temperature => "Temperature",
            ParameterId::Humidity => "Humidity",
        }
    }

    /// Unit of measurement
    pub const fn unit(&self) -> &'static str {
        match self {
            ParameterId::Ch4 | ParameterId::Mq135 | ParameterId::Etoh => "ppm",
            ParameterId::Voc => "ppb",
            ParameterId::Temperature => "°C",
            ParameterId::Humidity => "%",
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire name does not match any parameter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown parameter '{0}'")]
pub struct UnknownParameter(pub String);

impl FromStr for ParameterId {
    type Err = UnknownParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterId::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownParameter(s.to_string()))
    }
}

/// One timestamped snapshot of monitored values
///
/// Immutable once built. The timestamp (unix seconds) is the reading's
/// identity: two readings with the same timestamp are the same reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    timestamp: u64,
    parameters: ParameterMap,
}

impl Reading {
    /// Build a reading, coercing non-finite values to the malformed default
    pub fn new(timestamp: u64, values: impl IntoIterator<Item = (ParameterId, f64)>) -> Self {
        let parameters = values
            .into_iter()
            .map(|(id, value)| (id, sanitize(value)))
            .collect();

        Self {
            timestamp,
            parameters,
        }
    }

    /// Build a reading from a JSON object of `parameter -> value`
    ///
    /// Unknown keys are ignored. Numbers are taken as-is, numeric strings
    /// are parsed, everything else present becomes `0.0`.
    pub fn from_json_fields(timestamp: u64, fields: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut parameters = ParameterMap::new();

        for (key, raw) in fields {
            let id = match key.parse::<ParameterId>() {
                Ok(id) => id,
                Err(_) => {
                    log::trace!("ignoring unknown field '{}' in reading {}", key, timestamp);
                    continue;
                }
            };
            parameters.insert(id, coerce_json(raw));
        }

        Self::new(timestamp, parameters)
    }

    /// Unix timestamp in seconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Value for one parameter, if the reading carries it
    pub fn value(&self, id: ParameterId) -> Option<f64> {
        self.parameters.get(&id).copied()
    }

    /// All present parameters in evaluation order
    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    /// True when the reading carries no parameters at all
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        MALFORMED_VALUE_DEFAULT
    }
}

fn coerce_json(raw: &serde_json::Value) -> f64 {
    match raw {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(MALFORMED_VALUE_DEFAULT),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(MALFORMED_VALUE_DEFAULT),
        _ => MALFORMED_VALUE_DEFAULT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_wire_names() {
        for id in ParameterId::ALL {
            assert_eq!(id.as_str().parse::<ParameterId>(), Ok(id));
        }
        assert!("pressure".parse::<ParameterId>().is_err());
    }

    #[test]
    fn unknown_parameter_names_the_input() {
        let err = "pressure".parse::<ParameterId>().unwrap_err();
        assert_eq!(err, UnknownParameter("pressure".to_string()));
        assert_eq!(err.to_string(), "unknown parameter 'pressure'");
    }

    #[test]
    fn serde_uses_wire_names() {
        let encoded = serde_json::to_string(&ParameterId::Mq135).unwrap();
        assert_eq!(encoded, "\"mq135\"");
    }

    #[test]
    fn non_finite_values_become_zero() {
        let reading = Reading::new(
            10,
            [(ParameterId::Ch4, f64::NAN), (ParameterId::Voc, f64::INFINITY)],
        );
        assert_eq!(reading.value(ParameterId::Ch4), Some(0.0));
        assert_eq!(reading.value(ParameterId::Voc), Some(0.0));
        assert_eq!(reading.value(ParameterId::Etoh), None);
    }

    #[test]
    fn json_fields_are_coerced() {
        let fields = json!({
            "ch4": 1750,
            "mq135": "212.5",
            "voc": null,
            "etoh": "broken",
            "humidity": true,
            "pressure": 1013.0
        });
        let reading = Reading::from_json_fields(99, fields.as_object().unwrap());

        assert_eq!(reading.timestamp(), 99);
        assert_eq!(reading.value(ParameterId::Ch4), Some(1750.0));
        assert_eq!(reading.value(ParameterId::Mq135), Some(212.5));
        assert_eq!(reading.value(ParameterId::Voc), Some(0.0));
        assert_eq!(reading.value(ParameterId::Etoh), Some(0.0));
        assert_eq!(reading.value(ParameterId::Humidity), Some(0.0));
        assert_eq!(reading.value(ParameterId::Temperature), None);
        assert_eq!(reading.parameters().len(), 5);
    }

    #[test]
    fn parameters_iterate_in_declaration_order() {
        let reading = Reading::new(
            1,
            [(ParameterId::Humidity, 40.0), (ParameterId::Ch4, 500.0)],
        );
        let order: Vec<_> = reading.parameters().keys().copied().collect();
        assert_eq!(order, vec![ParameterId::Ch4, ParameterId::Humidity]);
    }
}
