//! Reading sources
//!
//! Each source turns its own wire shape into [`Reading`]s. Value coercion
//! is left to [`Reading::from_json_fields`], so every source treats a bad
//! sensor value the same way.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use freshguard_core::Reading;
use serde_json::Value;
use thiserror::Error;

use crate::http::{HttpConfig, HttpConnector, HttpError};
use crate::{lock, ConnectionStats, ConnectorError, ReadingSource};

/// Reasons a fetch produced no readings
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed
    #[error("fetch failed: {0}")]
    Http(#[from] HttpError),

    /// Local file could not be read
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// Payload did not have the expected shape
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Source is temporarily not serving readings
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Connector setup or runtime failure
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Parse a timestamp from a JSON key or field
fn parse_timestamp(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Readings from a Firebase Realtime Database `readings` node
pub struct FirebaseSource {
    http: HttpConnector,
}

impl FirebaseSource {
    /// Path of the readings node below the database root
    pub const READINGS_PATH: &'static str = "/readings.json";

    /// Connect to the database at `database_url`, optionally with an auth secret
    pub fn new(database_url: impl Into<String>, auth: Option<String>) -> Result<Self, SourceError> {
        let mut config = HttpConfig::new(database_url).timeout_secs(10);
        if let Some(secret) = auth {
            config = config.query_auth("auth", secret);
        }

        let http = HttpConnector::new(config)
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        Ok(Self { http })
    }

    /// Decode the `readings` node
    ///
    /// `null` means the node is empty. Keys that are not unix-second
    /// timestamps and records that are not objects are skipped.
    pub fn parse_snapshot(snapshot: &Value) -> Result<Vec<Reading>, SourceError> {
        let records = match snapshot {
            Value::Null => return Ok(Vec::new()),
            Value::Object(records) => records,
            other => {
                return Err(SourceError::Malformed(format!(
                    "expected an object keyed by timestamp, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut readings = Vec::with_capacity(records.len());
        for (key, record) in records {
            let Ok(timestamp) = key.parse::<u64>() else {
                log::debug!("skipping non-timestamp key '{}'", key);
                continue;
            };
            let Value::Object(fields) = record else {
                log::warn!("skipping reading {}: record is {}", timestamp, json_kind(record));
                continue;
            };
            readings.push(Reading::from_json_fields(timestamp, fields));
        }

        readings.sort_by_key(Reading::timestamp);
        Ok(readings)
    }
}

#[async_trait::async_trait]
impl ReadingSource for FirebaseSource {
    async fn fetch_readings(&self) -> Result<Vec<Reading>, SourceError> {
        let snapshot = self.http.get_json(Self::READINGS_PATH).await?;
        Self::parse_snapshot(&snapshot)
    }

    fn describe(&self) -> String {
        format!("firebase {}", self.http.base_url())
    }

    fn stats(&self) -> ConnectionStats {
        self.http.stats()
    }
}

/// Readings from a local file of JSON objects, one per line
///
/// ```text
/// {"timestamp": 1700000000, "ch4": 1320, "mq135": 260}
/// {"timestamp": 1700000015, "ch4": 1290, "mq135": "255"}
/// ```
///
/// A later line with the same timestamp replaces the earlier one.
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    /// Read from `path` on every fetch
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File being read
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode file contents, returning readings and the count of skipped lines
    pub fn parse(contents: &str) -> (Vec<Reading>, usize) {
        let mut by_timestamp = BTreeMap::new();
        let mut skipped = 0;

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<Value>(line).ok().and_then(|value| match value {
                Value::Object(fields) => {
                    let timestamp = fields.get("timestamp").and_then(parse_timestamp)?;
                    Some(Reading::from_json_fields(timestamp, &fields))
                }
                _ => None,
            });

            match parsed {
                Some(reading) => {
                    by_timestamp.insert(reading.timestamp(), reading);
                }
                None => {
                    log::warn!("skipping malformed line {}", number + 1);
                    skipped += 1;
                }
            }
        }

        (by_timestamp.into_values().collect(), skipped)
    }
}

#[async_trait::async_trait]
impl ReadingSource for JsonLinesSource {
    async fn fetch_readings(&self) -> Result<Vec<Reading>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let (readings, skipped) = Self::parse(&contents);

        if skipped > 0 {
            log::warn!("{}: {} malformed lines skipped", self.path.display(), skipped);
        }

        Ok(readings)
    }

    fn describe(&self) -> String {
        format!("json lines {}", self.path.display())
    }
}

/// Fixed in-memory readings; clones share the same store
#[derive(Clone, Default)]
pub struct MemorySource {
    readings: Arc<Mutex<Vec<Reading>>>,
    outage: Arc<Mutex<Option<String>>>,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl MemorySource {
    /// Serve `readings`
    pub fn new(readings: impl IntoIterator<Item = Reading>) -> Self {
        let source = Self::default();
        for reading in readings {
            source.push(reading);
        }
        source
    }

    /// Add a reading, keeping timestamp order
    pub fn push(&self, reading: Reading) {
        let mut readings = lock(&self.readings);
        readings.retain(|r| r.timestamp() != reading.timestamp());
        readings.push(reading);
        readings.sort_by_key(Reading::timestamp);
    }

    /// Make every fetch fail with `reason` until [`MemorySource::restore`]
    pub fn fail_with(&self, reason: impl Into<String>) {
        *lock(&self.outage) = Some(reason.into());
    }

    /// Serve readings again
    pub fn restore(&self) {
        *lock(&self.outage) = None;
    }
}

#[async_trait::async_trait]
impl ReadingSource for MemorySource {
    async fn fetch_readings(&self) -> Result<Vec<Reading>, SourceError> {
        if let Some(reason) = lock(&self.outage).clone() {
            let err = SourceError::Unavailable(reason);
            lock(&self.stats).record_failure(&err);
            return Err(err);
        }
        lock(&self.stats).record_success(0, 0);
        Ok(lock(&self.readings).clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn stats(&self) -> ConnectionStats {
        lock(&self.stats).clone()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
