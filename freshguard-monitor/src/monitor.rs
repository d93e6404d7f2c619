//! Polling loop
//!
//! One [`Monitor`] owns every piece of mutable state in the process: the
//! ledger, the dispatcher and its cooldown, and the snapshot feed. Cycles
//! run one after another inside a single task, so none of that state needs
//! a lock.
//!
//! ## Cycle
//!
//! ```text
//! fetch ──► none? ──► NoData
//!   │
//!   ▼
//! latest reading ──► reading_<ts> in ledger? ──► AlreadyProcessed (display refresh only)
//!   │
//!   ▼
//! evaluate (marks keys) ──► dispatch new alerts ──► announce fresh status ──► Evaluated
//! ```
//!
//! Any error ends the cycle, is logged, and is published on the snapshot
//! feed. The loop itself only stops on cancellation, which is checked
//! between cycles; a cycle in flight always completes.

use std::time::Duration;

use freshguard_connectors::{ConnectionStats, ReadingSource, SourceError};
use freshguard_core::constants::DEFAULT_POLL_INTERVAL;
use freshguard_core::{
    detect, evaluate, Alert, AlertKey, AlertLedger, Classification, ConditionClassifier,
    EvaluationError, Reading, ThresholdTable,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{DispatchOutcome, Dispatcher};

/// Why a cycle ended early
#[derive(Debug, Error)]
pub enum CycleError {
    /// Readings could not be fetched; nothing was changed
    #[error("fetch failed: {0}")]
    Fetch(#[from] SourceError),

    /// Evaluation was refused or the ledger could not be written
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleReport {
    /// Source had no readings
    NoData,
    /// Latest reading was handled by an earlier cycle
    AlreadyProcessed {
        /// Reading timestamp, unix seconds
        timestamp: u64,
        /// Alerts the reading currently triggers
        active_alerts: usize,
    },
    /// Latest reading was evaluated and notified
    Evaluated {
        /// Reading timestamp, unix seconds
        timestamp: u64,
        /// Alerts the reading triggers
        active_alerts: usize,
        /// Alerts not seen before this cycle
        new_alerts: usize,
        /// What the dispatcher did with the new alerts
        dispatch: DispatchOutcome,
    },
}

/// Latest state for whatever renders the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Latest reading seen
    pub reading: Option<Reading>,
    /// Every alert the latest reading triggers, new or not
    pub active_alerts: Vec<Alert>,
    /// Classifier verdict for the latest reading
    pub classification: Option<Classification>,
    /// Error of the last cycle; cleared by the next successful one
    pub last_error: Option<String>,
}

/// Classifier as held by the monitor
pub type BoxedClassifier = Box<dyn ConditionClassifier + Send + Sync>;

/// Ledger as held by the monitor
pub type BoxedLedger = Box<dyn AlertLedger + Send>;

/// Fetch, evaluate, notify; on a fixed interval
pub struct Monitor {
    source: Box<dyn ReadingSource>,
    ledger: BoxedLedger,
    dispatcher: Dispatcher,
    thresholds: Option<ThresholdTable>,
    classifier: Option<BoxedClassifier>,
    poll_interval: Duration,
    snapshot: watch::Sender<MonitorSnapshot>,
}

impl Monitor {
    /// Monitor with no thresholds or classifier; cycles are refused until both are set
    pub fn new(source: Box<dyn ReadingSource>, ledger: BoxedLedger, dispatcher: Dispatcher) -> Self {
        let (snapshot, _) = watch::channel(MonitorSnapshot::default());
        Self {
            source,
            ledger,
            dispatcher,
            thresholds: None,
            classifier: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            snapshot,
        }
    }

    /// Replace the threshold table
    pub fn with_thresholds(mut self, thresholds: Option<ThresholdTable>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Replace the classifier
    pub fn with_classifier(mut self, classifier: Option<BoxedClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Gap between cycles started by [`Monitor::run`]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Gap between cycles
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Keys recorded so far
    pub fn ledger(&self) -> &dyn AlertLedger {
        self.ledger.as_ref()
    }

    /// Notification side, including its cooldown state
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Counters of the reading source
    pub fn source_stats(&self) -> ConnectionStats {
        self.source.stats()
    }

    /// Receiver for the snapshot feed
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.subscribe()
    }

    /// Run cycles until `cancel` fires
    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!("polling every {}s", self.poll_interval.as_secs());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => log::debug!("cycle finished: {:?}", report),
                        Err(e) => log::error!("cycle failed: {}", e),
                    }
                }
            }
        }
    }

    /// Run one fetch-evaluate-notify cycle
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let result = self.cycle().await;
        if let Err(e) = &result {
            self.snapshot
                .send_modify(|snapshot| snapshot.last_error = Some(e.to_string()));
        }
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport, CycleError> {
        let readings = match self.source.fetch_readings().await {
            Ok(readings) => readings,
            Err(e) => {
                log::warn!(
                    "{}: {} fetches failed so far",
                    self.source.describe(),
                    self.source.stats().messages_failed
                );
                return Err(e.into());
            }
        };
        log::trace!("{}: {:?}", self.source.describe(), self.source.stats());

        let Some(latest) = readings.into_iter().max_by_key(Reading::timestamp) else {
            log::debug!("no readings available");
            return Ok(CycleReport::NoData);
        };
        let timestamp = latest.timestamp();

        if self.ledger.has(&AlertKey::reading(timestamp)) {
            let (thresholds, classifier) = match (&self.thresholds, &self.classifier) {
                (None, _) => return Err(EvaluationError::MissingThresholds.into()),
                (_, None) => return Err(EvaluationError::MissingClassifier.into()),
                (Some(t), Some(c)) => (t, c),
            };

            let (active, classification) = detect(&latest, thresholds, classifier.as_ref());
            log::trace!("reading {} already processed", timestamp);

            let active_alerts = active.len();
            self.publish(latest, active, classification);
            return Ok(CycleReport::AlreadyProcessed {
                timestamp,
                active_alerts,
            });
        }

        let evaluation = evaluate(
            &latest,
            self.thresholds.as_ref(),
            self.classifier.as_deref(),
            self.ledger.as_mut(),
        )?;

        if evaluation.has_new() {
            log::info!(
                "reading {}: {} new of {} active alerts",
                timestamp,
                evaluation.new.len(),
                evaluation.active.len()
            );
        }

        let dispatch = self
            .dispatcher
            .dispatch(&evaluation.new, timestamp, &evaluation.classification)
            .await;

        if !evaluation.classification.is_bad {
            self.dispatcher.announce_fresh(timestamp);
        }

        let report = CycleReport::Evaluated {
            timestamp,
            active_alerts: evaluation.active.len(),
            new_alerts: evaluation.new.len(),
            dispatch,
        };
        self.publish(latest, evaluation.active, evaluation.classification);
        Ok(report)
    }

    fn publish(&self, reading: Reading, active_alerts: Vec<Alert>, classification: Classification) {
        self.snapshot.send_replace(MonitorSnapshot {
            reading: Some(reading),
            active_alerts,
            classification: Some(classification),
            last_error: None,
        });
    }
}
