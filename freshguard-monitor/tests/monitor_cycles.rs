//! End-to-end polling cycles against in-memory collaborators
//!
//! Tests cover:
//! - Email rate limiting across consecutive cycles and clock corrections
//! - Silence on re-delivery of an already processed reading
//! - Email failure reporting
//! - Fetch failures, empty sources and missing configuration

mod common;

use std::time::Duration;

use freshguard_core::{AlertKey, EvaluationError};
use freshguard_monitor::{CycleError, CycleReport, DispatchPolicy, EmailOutcome};
use tokio_util::sync::CancellationToken;

use common::{calm, methane_spike, overheating, Harness};

const METHANE_DANGER: &str =
    "DANGER: Methane (CH₄) level is at 1750, which exceeds the danger threshold of 1700";

fn email_outcome(report: &CycleReport) -> Option<&EmailOutcome> {
    match report {
        CycleReport::Evaluated { dispatch, .. } => dispatch.email.as_ref(),
        _ => None,
    }
}

#[tokio::test]
async fn second_alert_within_cooldown_gets_toast_but_no_email() {
    let mut h = Harness::new();

    h.source.push(methane_spike(1_000));
    let first = h.monitor.run_cycle().await.unwrap();
    assert_eq!(email_outcome(&first), Some(&EmailOutcome::Sent));

    h.clock.advance(Duration::from_secs(10));
    h.source.push(methane_spike(1_015));
    let second = h.monitor.run_cycle().await.unwrap();
    assert!(matches!(
        email_outcome(&second),
        Some(EmailOutcome::Suppressed { retry_after_ms: 50_000 })
    ));

    assert_eq!(h.email.attempts(), 1);
    let danger_toasts = h.messages().iter().filter(|m| *m == METHANE_DANGER).count();
    assert_eq!(danger_toasts, 2);
    assert_eq!(
        h.monitor.dispatcher().state().last_notification_sent_at,
        Some(common::CLOCK_START_MS)
    );
}

#[tokio::test]
async fn email_resumes_after_cooldown() {
    let mut h = Harness::new();

    h.source.push(methane_spike(1_000));
    h.monitor.run_cycle().await.unwrap();

    h.clock.advance(Duration::from_secs(60));
    h.source.push(methane_spike(1_060));
    let report = h.monitor.run_cycle().await.unwrap();

    assert_eq!(email_outcome(&report), Some(&EmailOutcome::Sent));
    assert_eq!(h.email.sent().len(), 2);
    assert_eq!(h.email.sent()[1]["ch4_status"], "DANGER");
}

#[tokio::test]
async fn clock_stepped_back_does_not_silence_email() {
    let mut h = Harness::new();

    h.source.push(methane_spike(1_000));
    let first = h.monitor.run_cycle().await.unwrap();
    assert_eq!(email_outcome(&first), Some(&EmailOutcome::Sent));

    // Clock corrected an hour back, then ten minutes of real time pass
    h.clock.set(common::CLOCK_START_MS - 3_600_000);
    h.clock.advance(Duration::from_secs(600));
    h.source.push(methane_spike(1_600));
    let second = h.monitor.run_cycle().await.unwrap();

    assert_eq!(email_outcome(&second), Some(&EmailOutcome::Sent));
    assert_eq!(h.email.sent().len(), 2);

    // The cooldown restarts from the corrected time
    h.clock.advance(Duration::from_secs(10));
    h.source.push(methane_spike(1_610));
    let third = h.monitor.run_cycle().await.unwrap();
    assert!(matches!(
        email_outcome(&third),
        Some(EmailOutcome::Suppressed { retry_after_ms: 50_000 })
    ));
}

#[tokio::test]
async fn redelivered_reading_is_silent() {
    let mut h = Harness::new();
    h.source.push(methane_spike(1_000));

    h.monitor.run_cycle().await.unwrap();
    let toasts_after_first = h.toasts.toasts().len();
    let ledger_after_first = h.ledger_len();

    h.clock.advance(Duration::from_secs(120));
    let report = h.monitor.run_cycle().await.unwrap();

    assert_eq!(
        report,
        CycleReport::AlreadyProcessed {
            timestamp: 1_000,
            active_alerts: 2,
        }
    );
    assert_eq!(h.toasts.toasts().len(), toasts_after_first);
    assert_eq!(h.ledger_len(), ledger_after_first);
    assert_eq!(h.email.attempts(), 1);
}

#[tokio::test]
async fn spoiled_reading_records_and_announces() {
    let mut h = Harness::new();
    h.source.push(methane_spike(1_000));

    h.monitor.run_cycle().await.unwrap();

    let ledger = h.monitor.ledger();
    assert!(ledger.has(&AlertKey::from_raw("ch4_danger_1000")));
    assert!(ledger.has(&AlertKey::fruit_classification(1_000)));
    assert!(ledger.has(&AlertKey::reading(1_000)));
    assert_eq!(ledger.len(), 3);

    let messages = h.messages();
    assert_eq!(
        messages,
        vec![
            METHANE_DANGER.to_string(),
            "ALERT: Fruit is likely ROTTEN".to_string(),
            "Email Sent".to_string(),
        ]
    );

    let sent = h.email.sent();
    assert_eq!(sent[0]["fruit_status"], "ROTTEN");
    assert_eq!(sent[0]["alert_count"], "2");
}

#[tokio::test]
async fn fresh_reading_is_announced_without_email() {
    let mut h = Harness::new();
    h.source.push(calm(1_000));

    let report = h.monitor.run_cycle().await.unwrap();

    assert!(matches!(
        report,
        CycleReport::Evaluated { new_alerts: 0, ref dispatch, .. } if dispatch.email.is_none()
    ));
    assert_eq!(h.messages(), vec!["INFO: Fruit appears to be FRESH".to_string()]);
    assert_eq!(h.email.attempts(), 0);
    assert_eq!(h.ledger_len(), 1);
}

#[tokio::test]
async fn failed_email_is_reported_and_not_retried() {
    let mut h = Harness::new();
    h.email.fail_with("relay unreachable");

    h.source.push(methane_spike(1_000));
    let report = h.monitor.run_cycle().await.unwrap();

    assert_eq!(
        email_outcome(&report),
        Some(&EmailOutcome::Failed {
            reason: "delivery rejected: relay unreachable".to_string()
        })
    );
    assert!(h
        .messages()
        .contains(&"Failed to send email alert: delivery rejected: relay unreachable".to_string()));
    assert!(h.monitor.ledger().has(&AlertKey::from_raw("ch4_danger_1000")));
    let stats = h.monitor.dispatcher().email_stats().unwrap();
    assert_eq!(stats.messages_failed, 1);
    assert_eq!(stats.last_error.as_deref(), Some("delivery rejected: relay unreachable"));

    // The failed attempt still starts the cooldown
    h.email.succeed();
    h.clock.advance(Duration::from_secs(30));
    h.source.push(methane_spike(1_030));
    let report = h.monitor.run_cycle().await.unwrap();

    assert!(matches!(email_outcome(&report), Some(EmailOutcome::Suppressed { .. })));
    assert_eq!(h.email.attempts(), 1);
}

#[tokio::test]
async fn spoilage_policy_skips_email_for_fresh_produce() {
    let mut h = Harness::with_policy(DispatchPolicy {
        email_requires_spoilage: true,
        ..DispatchPolicy::default()
    });

    h.source.push(overheating(1_000));
    let report = h.monitor.run_cycle().await.unwrap();

    assert_eq!(email_outcome(&report), Some(&EmailOutcome::NotRequired));
    assert!(h.messages().iter().any(|m| m.starts_with("DANGER: Temperature")));
    assert_eq!(h.email.attempts(), 0);
    assert_eq!(h.monitor.dispatcher().state().last_notification_sent_at, None);
}

#[tokio::test]
async fn empty_source_reports_no_data() {
    let mut h = Harness::new();

    let report = h.monitor.run_cycle().await.unwrap();

    assert_eq!(report, CycleReport::NoData);
    assert_eq!(h.ledger_len(), 0);
    assert!(h.messages().is_empty());
}

#[tokio::test]
async fn fetch_failure_changes_nothing() {
    let mut h = Harness::new();
    let feed = h.monitor.subscribe();
    h.source.push(methane_spike(1_000));
    h.source.fail_with("database offline");

    let err = h.monitor.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Fetch(_)));
    assert_eq!(h.monitor.source_stats().messages_failed, 1);
    assert_eq!(h.ledger_len(), 0);
    assert!(h.messages().is_empty());
    assert_eq!(
        feed.borrow().last_error.as_deref(),
        Some("fetch failed: source unavailable: database offline")
    );

    h.source.restore();
    h.monitor.run_cycle().await.unwrap();
    assert_eq!(h.monitor.source_stats().messages_sent, 1);
    assert_eq!(h.ledger_len(), 3);
    assert!(feed.borrow().last_error.is_none());
}

#[tokio::test]
async fn missing_thresholds_refuse_every_cycle() {
    let mut h = Harness::new().without_thresholds();
    h.source.push(methane_spike(1_000));

    let err = h.monitor.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Evaluation(EvaluationError::MissingThresholds)));
    assert_eq!(h.ledger_len(), 0);
}

#[tokio::test]
async fn run_loop_stops_on_cancel() {
    let mut h = Harness::new();
    h.source.push(calm(1_000));
    let feed = h.monitor.subscribe();

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();

    tokio::join!(h.monitor.run(cancel), async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.cancel();
    });

    assert!(h.monitor.ledger().has(&AlertKey::reading(1_000)));
    let snapshot = feed.borrow();
    assert_eq!(snapshot.reading.as_ref().map(|r| r.timestamp()), Some(1_000));
    assert!(snapshot.active_alerts.is_empty());
}
