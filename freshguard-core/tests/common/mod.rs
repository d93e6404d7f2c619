//! Shared fixtures for core integration tests
//!
//! - Reading builders for the scenarios the dashboard actually sees
//! - A fixed-outcome classifier so threshold behavior can be tested alone

#![allow(dead_code)]

use freshguard_core::{Classification, ConditionClassifier, ParameterId, Reading};

/// Classifier with a predetermined verdict
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier {
    pub spoiled: bool,
}

impl FixedClassifier {
    pub fn fresh() -> Self {
        Self { spoiled: false }
    }

    pub fn spoiled() -> Self {
        Self { spoiled: true }
    }
}

impl ConditionClassifier for FixedClassifier {
    fn classify(&self, _: &Reading) -> Classification {
        let score = if self.spoiled { 12.0 } else { -12.0 };
        Classification {
            is_bad: self.spoiled,
            score,
            confidence: 1.2,
            threshold: 0.0,
        }
    }
}

/// All six parameters comfortably inside their normal band
pub fn calm_reading(timestamp: u64) -> Reading {
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

/// Methane in danger, ethanol in warning, the rest calm
pub fn gassing_reading(timestamp: u64) -> Reading {
    Reading::new(
        timestamp,
        [
            (ParameterId::Ch4, 1800.0),
            (ParameterId::Mq135, 320.0),
            (ParameterId::Voc, 150.0),
            (ParameterId::Etoh, 450.0),
            (ParameterId::Temperature, 24.0),
            (ParameterId::Humidity, 55.0),
        ],
    )
}
