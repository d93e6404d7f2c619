//! FreshGuard monitor
//!
//! Glues the pieces together into the long-running process:
//!
//! - [`config`]: JSON file + environment, and building everything from it
//! - [`dispatcher`]: toasts and rate-limited consolidated emails
//! - [`monitor`]: the fetch-evaluate-notify polling loop
//!
//! ```rust,no_run
//! use freshguard_monitor::config::MonitorConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::load(None)?;
//! let mut monitor = config.build()?;
//!
//! let cancel = CancellationToken::new();
//! monitor.run(cancel).await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dispatcher;
pub mod monitor;

pub use config::{ConfigError, MonitorConfig};
pub use dispatcher::{DispatchOutcome, DispatchPolicy, DispatchState, Dispatcher, EmailOutcome};
pub use monitor::{CycleError, CycleReport, Monitor, MonitorSnapshot};
