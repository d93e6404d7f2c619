//! Shared harness for monitor integration tests
//!
//! Wires a [`Monitor`] to in-memory collaborators and keeps a handle to
//! each one, so a test can feed readings, move the clock and inspect what
//! the user would have seen.

#![allow(dead_code)]

use std::sync::Arc;

use freshguard_connectors::{MemoryEmail, MemorySource, MemoryToast};
use freshguard_core::time::ManualClock;
use freshguard_core::{MemoryLedger, ParameterId, Reading, ThresholdTable};
use freshguard_ml::ClassifierModel;
use freshguard_monitor::monitor::BoxedClassifier;
use freshguard_monitor::{DispatchPolicy, Dispatcher, Monitor};

/// Clock start, far from zero so cooldown arithmetic is exercised
pub const CLOCK_START_MS: u64 = 1_700_000_000_000;

pub struct Harness {
    pub monitor: Monitor,
    pub source: MemorySource,
    pub toasts: MemoryToast,
    pub email: MemoryEmail,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(DispatchPolicy::default())
    }

    pub fn with_policy(policy: DispatchPolicy) -> Self {
        let source = MemorySource::default();
        let toasts = MemoryToast::new();
        let email = MemoryEmail::new();
        let clock = ManualClock::new(CLOCK_START_MS);

        let dispatcher = Dispatcher::new(
            Box::new(toasts.clone()),
            Some(Box::new(email.clone())),
            Arc::new(clock.clone()),
            policy,
        );

        let monitor = Monitor::new(Box::new(source.clone()), Box::new(MemoryLedger::new()), dispatcher)
            .with_thresholds(Some(ThresholdTable::default()))
            .with_classifier(Some(Box::new(ClassifierModel::default()) as BoxedClassifier));

        Self {
            monitor,
            source,
            toasts,
            email,
            clock,
        }
    }

    /// Same harness with the threshold table removed
    pub fn without_thresholds(mut self) -> Self {
        self.monitor = self.monitor.with_thresholds(None);
        self
    }

    /// Toast messages shown so far
    pub fn messages(&self) -> Vec<String> {
        self.toasts.messages()
    }

    pub fn ledger_len(&self) -> usize {
        self.monitor.ledger().len()
    }
}

/// Calm storage air; the shipped model calls it fresh
pub fn calm(timestamp: u64) -> Reading {
    Reading::new(
        timestamp,
        [
            (ParameterId::Ch4, 400.0),
            (ParameterId::Mq135, 320.0),
            (ParameterId::Voc, 150.0),
            (ParameterId::Etoh, 50.0),
            (ParameterId::Temperature, 24.0),
            (ParameterId::Humidity, 55.0),
        ],
    )
}

/// Methane past its danger level; the shipped model calls it rotten
pub fn methane_spike(timestamp: u64) -> Reading {
    Reading::new(
        timestamp,
        [
            (ParameterId::Ch4, 1750.0),
            (ParameterId::Mq135, 320.0),
            (ParameterId::Voc, 150.0),
            (ParameterId::Etoh, 50.0),
            (ParameterId::Temperature, 24.0),
            (ParameterId::Humidity, 55.0),
        ],
    )
}

/// Storage unit overheating while the produce itself still looks fresh
pub fn overheating(timestamp: u64) -> Reading {
    Reading::new(
        timestamp,
        [
            (ParameterId::Ch4, 400.0),
            (ParameterId::Mq135, 320.0),
            (ParameterId::Voc, 150.0),
            (ParameterId::Etoh, 50.0),
            (ParameterId::Temperature, 55.0),
            (ParameterId::Humidity, 55.0),
        ],
    )
}
