//! Notification Dispatch
//!
//! ## Overview
//!
//! The dispatcher turns the *new* alerts of one evaluation into user-facing
//! notifications on two channels with very different costs:
//!
//! | Channel | Granularity            | Rate limit                          |
//! |---------|------------------------|-------------------------------------|
//! | Toast   | one per alert          | none (deduplicated by alert key)    |
//! | Email   | one per reading        | one attempt per cooldown (60 s)     |
//!
//! ## Cooldown
//!
//! ```text
//! attempt email  ⇔  last_notification_sent_at is None
//!                   or now - last_notification_sent_at >= cooldown
//! ```
//!
//! The timestamp moves on every *attempt*, successful or not, so a relay
//! that is down is not hammered once per poll. A suppressed email is simply
//! dropped: the ledger already holds its alerts, and nothing re-sends them.
//!
//! Clock time comes from a monotonic source in production. If the clock
//! nevertheless reads earlier than the last attempt, the cooldown counts as
//! expired: a backwards step can cost one extra email, never a silenced one.
//!
//! ## Failure Handling
//!
//! Email delivery is at-most-once. A failure is shown as an error toast and
//! logged; the alerts stay recorded and are not retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use freshguard_connectors::{
    ConnectionStats, EmailChannel, EmailFields, ToastChannel, ToastLevel,
};
use freshguard_core::time::{elapsed_ms, TimeSource, Timestamp};
use freshguard_core::{Alert, AlertKey, AlertKind, Classification, ParameterId, Severity};
use serde::Serialize;

/// Toast shown when a newly processed reading classifies as spoiled
pub const ROTTEN_MESSAGE: &str = "ALERT: Fruit is likely ROTTEN";

/// Toast shown when a newly processed reading classifies as fresh
pub const FRESH_MESSAGE: &str = "INFO: Fruit appears to be FRESH";

/// Toast shown after an accepted email
pub const EMAIL_SENT_MESSAGE: &str = "Email Sent";

/// Rate-limit bookkeeping, owned by one dispatcher and never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchState {
    /// Clock time of the last email attempt; `None` before the first one
    pub last_notification_sent_at: Option<Timestamp>,
}

/// Dispatch tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Minimum gap between email attempts
    pub cooldown: Duration,
    /// Only email for readings the classifier judged spoiled
    pub email_requires_spoilage: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            cooldown: freshguard_core::constants::EMAIL_COOLDOWN,
            email_requires_spoilage: false,
        }
    }
}

/// What happened to the consolidated email for one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmailOutcome {
    /// Channel accepted the message
    Sent,
    /// Channel rejected the message
    Failed {
        /// Error reported by the channel
        reason: String,
    },
    /// Cooldown still running
    Suppressed {
        /// Time until the next attempt is allowed
        retry_after_ms: u64,
    },
    /// Policy requires a spoiled reading and this one is not
    NotRequired,
    /// No email channel configured
    NoChannel,
}

/// Result of one dispatch call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    /// Toasts requested (the channel may drop repeats)
    pub toasts: usize,
    /// `None` when there was nothing new to notify about
    pub email: Option<EmailOutcome>,
}

impl DispatchOutcome {
    fn nothing() -> Self {
        Self {
            toasts: 0,
            email: None,
        }
    }
}

/// Sends toasts and rate-limited emails for new alerts
pub struct Dispatcher {
    toast: Box<dyn ToastChannel>,
    email: Option<Box<dyn EmailChannel>>,
    clock: Arc<dyn TimeSource>,
    policy: DispatchPolicy,
    state: DispatchState,
}

impl Dispatcher {
    /// Dispatcher with a fresh rate-limit state
    ///
    /// Without an email channel every dispatch reports
    /// [`EmailOutcome::NoChannel`].
    pub fn new(
        toast: Box<dyn ToastChannel>,
        email: Option<Box<dyn EmailChannel>>,
        clock: Arc<dyn TimeSource>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            toast,
            email,
            clock,
            policy,
            state: DispatchState::default(),
        }
    }

    /// Current rate-limit state
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Active tuning
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Counters of the email channel, if one is configured
    pub fn email_stats(&self) -> Option<ConnectionStats> {
        self.email.as_ref().map(|channel| channel.stats())
    }

    /// Notify about the new alerts of one reading
    ///
    /// Does nothing when `new_alerts` is empty.
    pub async fn dispatch(
        &mut self,
        new_alerts: &[Alert],
        reading_timestamp: u64,
        classification: &Classification,
    ) -> DispatchOutcome {
        if new_alerts.is_empty() {
            return DispatchOutcome::nothing();
        }

        for alert in new_alerts {
            let level = match alert.severity {
                Severity::Danger => ToastLevel::Error,
                Severity::Warning => ToastLevel::Warning,
            };
            self.toast
                .notify(&alert_message(alert), level, alert.key().as_str());
        }

        let email = self.email_once(new_alerts, reading_timestamp, classification).await;

        DispatchOutcome {
            toasts: new_alerts.len(),
            email: Some(email),
        }
    }

    /// Tell the user a newly processed reading looks fresh
    pub fn announce_fresh(&mut self, reading_timestamp: u64) {
        self.toast.notify(
            FRESH_MESSAGE,
            ToastLevel::Info,
            AlertKey::fruit_classification(reading_timestamp).as_str(),
        );
    }

    async fn email_once(
        &mut self,
        new_alerts: &[Alert],
        reading_timestamp: u64,
        classification: &Classification,
    ) -> EmailOutcome {
        let Some(channel) = self.email.as_ref() else {
            return EmailOutcome::NoChannel;
        };

        if self.policy.email_requires_spoilage && !classification.is_bad {
            log::debug!("reading {} not spoiled; email not required", reading_timestamp);
            return EmailOutcome::NotRequired;
        }

        let now = self.clock.now();
        let cooldown_ms = u64::try_from(self.policy.cooldown.as_millis()).unwrap_or(u64::MAX);
        if let Some(last) = self.state.last_notification_sent_at {
            match elapsed_ms(last, now) {
                Some(elapsed) if elapsed < cooldown_ms => {
                    log::info!(
                        "email for reading {} suppressed, cooldown has {} ms left",
                        reading_timestamp,
                        cooldown_ms - elapsed
                    );
                    return EmailOutcome::Suppressed {
                        retry_after_ms: cooldown_ms - elapsed,
                    };
                }
                Some(_) => {}
                // The interval since `last` is unknown, so the cooldown cannot be running
                None => log::warn!(
                    "clock moved back {} ms since the last email; cooldown reset",
                    last - now
                ),
            }
        }

        self.state.last_notification_sent_at = Some(now);
        let fields = email_fields(new_alerts, reading_timestamp, classification);

        match channel.send(&fields).await {
            Ok(()) => {
                log::info!("alert email sent for reading {}", reading_timestamp);
                self.toast.notify(
                    EMAIL_SENT_MESSAGE,
                    ToastLevel::Info,
                    &format!("email_sent_{}", reading_timestamp),
                );
                EmailOutcome::Sent
            }
            Err(e) => {
                log::error!(
                    "alert email for reading {} failed ({} failures so far): {}",
                    reading_timestamp,
                    channel.stats().messages_failed,
                    e
                );
                self.toast.notify(
                    &format!("Failed to send email alert: {}", e),
                    ToastLevel::Error,
                    &format!("email_error_{}", reading_timestamp),
                );
                EmailOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Toast text for one alert
pub fn alert_message(alert: &Alert) -> String {
    match alert.kind {
        AlertKind::FruitStatus => ROTTEN_MESSAGE.to_string(),
        AlertKind::Parameter(id) => format!(
            "{}: {} level is at {}, which {} the {} threshold of {}",
            alert.severity.as_upper(),
            id.label(),
            alert.value,
            alert.direction.verb(),
            alert.severity.as_str(),
            alert.threshold_crossed,
        ),
    }
}

/// Human-readable UTC time of a reading
fn format_reading_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Fields of the consolidated email for one reading
///
/// Parameters without a new alert report `"Normal"` for both value and
/// status, matching what the email template expects.
pub fn email_fields(
    new_alerts: &[Alert],
    reading_timestamp: u64,
    classification: &Classification,
) -> EmailFields {
    let severity = Severity::highest(new_alerts).unwrap_or(Severity::Warning);
    let count = new_alerts.len();
    let when = format_reading_time(reading_timestamp);

    let mut fields = EmailFields::new();
    let mut put = |name: &str, value: String| {
        fields.insert(name.to_string(), value);
    };

    put(
        "subject",
        format!(
            "FreshGuard {}: {} new alert{}",
            severity,
            count,
            if count == 1 { "" } else { "s" }
        ),
    );
    put(
        "message",
        new_alerts
            .iter()
            .map(alert_message)
            .collect::<Vec<_>>()
            .join("\n"),
    );
    put("timestamp", when);
    put("severity", severity.as_upper().to_string());
    put("alert_count", count.to_string());
    put(
        "fruit_status",
        if classification.is_bad { "ROTTEN" } else { "FRESH" }.to_string(),
    );
    put("fruit_score", format!("{:.4}", classification.score));
    put("fruit_confidence", format!("{:.1}", classification.confidence));

    for id in ParameterId::ALL {
        let alert = new_alerts.iter().find(|a| a.parameter() == Some(id));
        let (value, status) = match alert {
            Some(alert) => (alert.value.to_string(), alert.severity.as_upper().to_string()),
            None => ("Normal".to_string(), "Normal".to_string()),
        };
        put(&format!("{}_value", id), value);
        put(&format!("{}_status", id), status);
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshguard_core::Direction;

    fn ch4_danger(ts: u64) -> Alert {
        Alert {
            kind: AlertKind::Parameter(ParameterId::Ch4),
            severity: Severity::Danger,
            value: 1750.0,
            threshold_crossed: 1700.0,
            direction: Direction::AboveIsBad,
            reading_timestamp: ts,
        }
    }

    fn mq135_warning(ts: u64) -> Alert {
        Alert {
            kind: AlertKind::Parameter(ParameterId::Mq135),
            severity: Severity::Warning,
            value: 200.0,
            threshold_crossed: 240.0,
            direction: Direction::BelowIsBad,
            reading_timestamp: ts,
        }
    }

    fn fresh() -> Classification {
        Classification {
            is_bad: false,
            score: -2.5,
            confidence: 0.25,
            threshold: 0.0,
        }
    }

    #[test]
    fn parameter_toast_text() {
        assert_eq!(
            alert_message(&ch4_danger(1)),
            "DANGER: Methane (CH₄) level is at 1750, which exceeds the danger threshold of 1700"
        );
        assert_eq!(
            alert_message(&mq135_warning(1)),
            "WARNING: MQ135 Sensor level is at 200, which falls below the warning threshold of 240"
        );
    }

    #[test]
    fn consolidated_fields() {
        let fields = email_fields(&[ch4_danger(1_700_000_000), mq135_warning(1_700_000_000)], 1_700_000_000, &fresh());

        assert_eq!(fields["subject"], "FreshGuard DANGER: 2 new alerts");
        assert_eq!(fields["severity"], "DANGER");
        assert_eq!(fields["alert_count"], "2");
        assert_eq!(fields["timestamp"], "2023-11-14 22:13:20 UTC");
        assert_eq!(fields["fruit_status"], "FRESH");
        assert_eq!(fields["fruit_score"], "-2.5000");
        assert_eq!(fields["ch4_value"], "1750");
        assert_eq!(fields["ch4_status"], "DANGER");
        assert_eq!(fields["mq135_status"], "WARNING");
        assert_eq!(fields["voc_value"], "Normal");
        assert_eq!(fields["humidity_status"], "Normal");
        assert_eq!(fields["message"].lines().count(), 2);
    }

    #[test]
    fn warning_only_email_is_warning() {
        let fields = email_fields(&[mq135_warning(5)], 5, &fresh());
        assert_eq!(fields["severity"], "WARNING");
        assert_eq!(fields["subject"], "FreshGuard WARNING: 1 new alert");
    }
}
