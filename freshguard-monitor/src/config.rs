//! Monitor configuration
//!
//! ## Sources of Configuration
//!
//! 1. A JSON file, if one is given
//! 2. Built-in defaults for every field the file omits (and for everything
//!    when there is no file)
//! 3. Environment overrides, applied last
//!
//! | Variable                  | Overrides                                 |
//! |---------------------------|-------------------------------------------|
//! | `FRESHGUARD_POLL_SECS`    | `poll_interval_secs`                      |
//! | `FRESHGUARD_LEDGER`       | `ledger_path`                             |
//! | `FRESHGUARD_DATABASE_URL` | `source` (switches to Firebase)           |
//! | `FRESHGUARD_DATABASE_AUTH`| Firebase auth secret                      |
//! | `SMTP_*`                  | `email`, only when the file sets none     |
//!
//! The `smtp` email kind and the `SMTP_*` fallback need the `smtp` cargo
//! feature, which is on by default. Without it the monitor builds without
//! `lettre` and a config naming `"kind": "smtp"` is rejected at parse time.
//!
//! ## Example File
//!
//! ```json
//! {
//!   "poll_interval_secs": 15,
//!   "email_cooldown_secs": 60,
//!   "ledger_path": "/var/lib/freshguard/ledger.jsonl",
//!   "source": { "kind": "firebase", "database_url": "https://store-7.firebaseio.com" },
//!   "thresholds": {
//!     "ch4":         { "warning": 1200, "danger": 1700, "direction": "above_is_bad" },
//!     "mq135":       { "warning": 240,  "danger": 100,  "direction": "below_is_bad" },
//!     "voc":         { "warning": 1000, "danger": 1100, "direction": "above_is_bad" },
//!     "etoh":        { "warning": 400,  "danger": 600,  "direction": "above_is_bad" },
//!     "temperature": { "warning": 45,   "danger": 50,   "direction": "above_is_bad" },
//!     "humidity":    { "warning": 100,  "danger": 110,  "direction": "above_is_bad" }
//!   },
//!   "classifier": {
//!     "weights": { "ch4": 0.0141, "mq135": -0.0353, "voc": -0.0228, "etoh": 0.0281 },
//!     "bias": -0.0001,
//!     "threshold": 0
//!   },
//!   "email": { "kind": "emailjs", "service_id": "svc", "template_id": "tpl", "user_id": "pk" }
//! }
//! ```
//!
//! A file that leaves out `thresholds` or `classifier` is taken at its word:
//! the monitor starts, but every cycle refuses to evaluate until the file is
//! fixed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use freshguard_connectors::{
    EmailChannel, EmailError, EmailJsChannel, EmailJsConfig, FirebaseSource, JsonLinesSource,
    LogToast, ReadingSource, SourceError,
};
#[cfg(feature = "smtp")]
use freshguard_connectors::{SmtpConfig, SmtpEmailChannel};
use freshguard_core::constants::{DEFAULT_POLL_INTERVAL, EMAIL_COOLDOWN};
use freshguard_core::time::MonotonicTime;
use freshguard_core::{ConditionClassifier, FileLedger, LedgerError, ThresholdTable};
use freshguard_ml::ClassifierModel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatcher::{DispatchPolicy, Dispatcher};
use crate::monitor::Monitor;

/// Problems loading configuration or building the monitor from it
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// File that was asked for
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid JSON for [`MonitorConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Environment override could not be parsed
    #[error("invalid value for {name}: {value}")]
    Env {
        /// Variable name
        name: &'static str,
        /// Value as found
        value: String,
    },

    /// Parsed, but not usable
    #[error("{0}")]
    Invalid(String),

    /// Ledger file could not be opened
    #[error("cannot open ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// Reading source rejected its settings
    #[error("cannot set up reading source: {0}")]
    Source(#[from] SourceError),

    /// Email channel rejected its settings
    #[error("cannot set up email channel: {0}")]
    Email(#[from] EmailError),
}

/// Where readings come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Firebase Realtime Database REST endpoint
    Firebase {
        /// Database root, e.g. `https://store-7.firebaseio.com`
        database_url: String,
        /// Database secret sent as `?auth=`
        #[serde(default)]
        auth: Option<String>,
    },
    /// Local JSON-lines file
    JsonLines {
        /// File with one reading object per line
        path: PathBuf,
    },
}

/// How consolidated alerts are emailed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailConfig {
    /// EmailJS template API
    #[serde(rename = "emailjs")]
    EmailJs(EmailJsConfig),
    /// SMTP relay
    #[cfg(feature = "smtp")]
    Smtp(SmtpConfig),
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_email_cooldown_secs() -> u64 {
    EMAIL_COOLDOWN.as_secs()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("freshguard-ledger.jsonl")
}

fn default_source() -> SourceConfig {
    SourceConfig::JsonLines {
        path: PathBuf::from("readings.jsonl"),
    }
}

/// Everything the monitor binary needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Minimum seconds between email attempts
    #[serde(default = "default_email_cooldown_secs")]
    pub email_cooldown_secs: u64,
    /// Alert ledger journal
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Only email when the classifier judged the reading spoiled
    #[serde(default)]
    pub email_requires_spoilage: bool,
    /// Where readings come from
    #[serde(default = "default_source")]
    pub source: SourceConfig,
    /// Threshold table; cycles are refused without one
    #[serde(default)]
    pub thresholds: Option<ThresholdTable>,
    /// Classifier model; cycles are refused without one
    #[serde(default)]
    pub classifier: Option<ClassifierModel>,
    /// Email transport; toasts only when absent
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            email_cooldown_secs: default_email_cooldown_secs(),
            ledger_path: default_ledger_path(),
            email_requires_spoilage: false,
            source: default_source(),
            thresholds: Some(ThresholdTable::default()),
            classifier: Some(ClassifierModel::default()),
            email: None,
        }
    }
}

impl MonitorConfig {
    /// Parse a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse config text
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (or defaults), then apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::info!("loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => {
                log::info!("no configuration file given, using built-in defaults");
                Self::default()
            }
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;

        #[cfg(feature = "smtp")]
        if config.email.is_none() {
            config.email = SmtpConfig::from_env().map(EmailConfig::Smtp);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FRESHGUARD_POLL_SECS") {
            self.poll_interval_secs = value.trim().parse().map_err(|_| ConfigError::Env {
                name: "FRESHGUARD_POLL_SECS",
                value,
            })?;
        }

        if let Some(value) = lookup("FRESHGUARD_LEDGER") {
            self.ledger_path = PathBuf::from(value);
        }

        if let Some(database_url) = lookup("FRESHGUARD_DATABASE_URL") {
            let auth = match &self.source {
                SourceConfig::Firebase { auth, .. } => auth.clone(),
                SourceConfig::JsonLines { .. } => None,
            };
            self.source = SourceConfig::Firebase { database_url, auth };
        }

        if let Some(secret) = lookup("FRESHGUARD_DATABASE_AUTH") {
            if let SourceConfig::Firebase { auth, .. } = &mut self.source {
                *auth = Some(secret);
            }
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be at least 1".into()));
        }
        if self.thresholds.is_none() {
            log::warn!("no threshold table configured; every cycle will be refused");
        }
        if self.classifier.is_none() {
            log::warn!("no classifier model configured; every cycle will be refused");
        }
        Ok(())
    }

    /// Gap between cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Minimum gap between email attempts
    pub fn email_cooldown(&self) -> Duration {
        Duration::from_secs(self.email_cooldown_secs)
    }

    /// Build the production monitor: file ledger, log toasts, monotonic clock
    pub fn build(&self) -> Result<Monitor, ConfigError> {
        let source: Box<dyn ReadingSource> = match &self.source {
            SourceConfig::Firebase { database_url, auth } => {
                Box::new(FirebaseSource::new(database_url.clone(), auth.clone())?)
            }
            SourceConfig::JsonLines { path } => Box::new(JsonLinesSource::new(path.clone())),
        };

        let email: Option<Box<dyn EmailChannel>> = match &self.email {
            Some(EmailConfig::EmailJs(config)) => Some(Box::new(EmailJsChannel::new(config.clone())?)),
            #[cfg(feature = "smtp")]
            Some(EmailConfig::Smtp(config)) => Some(Box::new(SmtpEmailChannel::new(config.clone()))),
            None => {
                log::warn!("no email channel configured; alerts will only be shown as toasts");
                None
            }
        };

        let ledger = FileLedger::open(&self.ledger_path)?;

        let dispatcher = Dispatcher::new(
            Box::new(LogToast::new()),
            email,
            Arc::new(MonotonicTime::new()),
            DispatchPolicy {
                cooldown: self.email_cooldown(),
                email_requires_spoilage: self.email_requires_spoilage,
            },
        );

        log::info!(
            "monitoring {} every {}s, ledger {}",
            source.describe(),
            self.poll_interval_secs,
            self.ledger_path.display()
        );

        Ok(Monitor::new(source, Box::new(ledger), dispatcher)
            .with_thresholds(self.thresholds.clone())
            .with_classifier(
                self.classifier
                    .clone()
                    .map(|m| Box::new(m) as Box<dyn ConditionClassifier + Send + Sync>),
            )
            .with_poll_interval(self.poll_interval()))
    }
}
