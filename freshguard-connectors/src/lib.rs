//! Reading Sources and Notification Channels
//!
//! ## Overview
//!
//! The alert engine itself never does I/O. Everything that crosses the
//! process boundary lives here, behind three small traits:
//!
//! | Trait             | Direction | Shipped implementations                                |
//! |-------------------|-----------|--------------------------------------------------------|
//! | [`ReadingSource`] | inbound   | `FirebaseSource`, `JsonLinesSource`, `MemorySource`    |
//! | [`EmailChannel`]  | outbound  | `EmailJsChannel`, `SmtpEmailChannel`, `MemoryEmail`    |
//! | [`ToastChannel`]  | outbound  | `LogToast`, `MemoryToast`                              |
//!
//! ## Firebase Realtime Database
//!
//! Sensor nodes push into a `readings` node keyed by unix-second timestamp:
//!
//! ```text
//! GET {database_url}/readings.json
//!
//! {
//!   "1700000000": { "ch4": 1320, "mq135": 260, "voc": 410, ... },
//!   "1700000015": { "ch4": 1290, "mq135": 255, "voc": "", ... }
//! }
//! ```
//!
//! The REST API is plain HTTPS, so the source sits on the shared
//! [`http::HttpConnector`] rather than a vendor SDK.
//!
//! ## Email Delivery
//!
//! Two transports carry the consolidated alert email:
//!
//! - **EmailJS**: template-based HTTP API, what the browser dashboard used.
//!   The template receives every field of the consolidated message.
//! - **SMTP**: direct STARTTLS relay through `lettre` for deployments that
//!   already run a mail server.
//!
//! Email sends are attempted once. A failed send is reported to the caller
//! and never retried here, so a flaky relay cannot produce duplicate mail.
//!
//! ## Retry Logic
//!
//! Reads are retried with exponential backoff:
//! ```text
//! retry_delay = 100ms * 2^attempt
//! ```
//! Server errors (5xx, 429) and transport failures are retried, client
//! errors are not.
//!
//! ## Blocking I/O
//!
//! `ureq` is a blocking client. Every call runs on tokio's blocking pool via
//! `spawn_blocking`, so a slow database never stalls the runtime thread that
//! drives the polling loop.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use freshguard_connectors::{ReadingSource, source::FirebaseSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = FirebaseSource::new("https://freshguard-demo.firebaseio.com", None)?;
//!
//! let readings = source.fetch_readings().await?;
//! if let Some(latest) = readings.last() {
//!     println!("latest reading at {}", latest.timestamp());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod email;
pub mod http;
pub mod source;
pub mod toast;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use freshguard_core::Reading;
use thiserror::Error;

// Re-export common types
pub use email::{EmailError, EmailJsChannel, EmailJsConfig, MemoryEmail};
pub use http::{HttpConfig, HttpConnector, HttpError};
pub use source::{FirebaseSource, JsonLinesSource, MemorySource, SourceError};
pub use toast::{LogToast, MemoryToast, Toast, ToastLevel, TOAST_MEMORY};

#[cfg(feature = "smtp")]
pub use email::{SmtpConfig, SmtpEmailChannel};

/// Named fields of a consolidated notification, as handed to a template
pub type EmailFields = BTreeMap<String, String>;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Connector could not be built from its settings
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Source of sensor readings
///
/// Implementations return every reading they can see, ascending by
/// timestamp. Choosing the latest one is the caller's job.
#[async_trait::async_trait]
pub trait ReadingSource: Send + Sync {
    /// Fetch all available readings
    async fn fetch_readings(&self) -> Result<Vec<Reading>, SourceError>;

    /// Short description for logs
    fn describe(&self) -> String;

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats {
        ConnectionStats::default()
    }
}

/// Outbound email transport
#[async_trait::async_trait]
pub trait EmailChannel: Send + Sync {
    /// Deliver one message built from `fields`
    async fn send(&self, fields: &EmailFields) -> Result<(), EmailError>;

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats {
        ConnectionStats::default()
    }
}

/// In-session user notification surface
///
/// Idempotent per `dedupe_key`: a toast whose key the channel still
/// remembers is dropped. Long-running channels may forget old keys.
pub trait ToastChannel: Send {
    /// Show `message` unless `dedupe_key` was already shown
    fn notify(&mut self, message: &str, level: ToastLevel, dedupe_key: &str);
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total payload bytes received
    pub bytes_received: u64,
    /// Last error message
    pub last_error: Option<String>,
}

impl ConnectionStats {
    pub(crate) fn record_success(&mut self, sent: usize, received: usize) {
        self.messages_sent += 1;
        self.bytes_sent += sent as u64;
        self.bytes_received += received as u64;
    }

    pub(crate) fn record_failure(&mut self, error: &impl std::fmt::Display) {
        self.messages_failed += 1;
        self.last_error = Some(error.to_string());
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
