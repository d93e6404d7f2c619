//! Spoilage Classification for Produce Storage
//!
//! ## Overview
//!
//! Ripening and rotting fruit give off a recognizable mix of gases: methane
//! and ethanol rise, while the broad-spectrum MQ-135 reading and the VOC
//! index move the other way. A single linear model over the six monitored
//! parameters separates "likely rotten" from "appears fresh" well enough to
//! drive a storage alert, and it is small enough to audit by eye.
//!
//! ## Model
//!
//! ```text
//! score      = bias + Σ value[p] × weight[p]      (p in ParameterId order)
//! is_bad     = score > threshold
//! confidence = min(100, |score - threshold| / 10)
//! ```
//!
//! A parameter missing from the reading, or a weight missing from the model,
//! contributes nothing. `confidence` is a distance-from-boundary heuristic,
//! not a calibrated probability, and is only ever shown to people.
//!
//! ## Shipped Weights
//!
//! | Parameter     | Weight   |
//! |---------------|----------|
//! | `ch4`         | 0.0141   |
//! | `mq135`       | -0.0353  |
//! | `voc`         | -0.0228  |
//! | `etoh`        | 0.0281   |
//! | `temperature` | 0        |
//! | `humidity`    | 0        |
//!
//! Bias `-0.0001`, threshold `0`. Temperature and humidity carry zero weight
//! but stay in the model so a retrained file can switch them on.
//!
//! ## Integration with the Evaluator
//!
//! [`ClassifierModel`] implements
//! [`ConditionClassifier`](freshguard_core::ConditionClassifier), so it plugs
//! straight into [`freshguard_core::evaluate`]:
//!
//! ```rust
//! use freshguard_core::{evaluate, MemoryLedger, ParameterId, Reading, ThresholdTable};
//! use freshguard_ml::ClassifierModel;
//!
//! let model = ClassifierModel::default();
//! let table = ThresholdTable::default();
//! let mut ledger = MemoryLedger::new();
//!
//! let reading = Reading::new(1_700_000_000, [
//!     (ParameterId::Ch4, 2000.0),
//!     (ParameterId::Mq135, 50.0),
//! ]);
//!
//! let evaluation = evaluate(&reading, Some(&table), Some(&model), &mut ledger).unwrap();
//! assert!(evaluation.classification.is_bad);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;

pub mod classifier;
pub mod model;

pub use classifier::classify;
pub use model::ClassifierModel;

/// Result type for model construction
pub type MLResult<T> = Result<T, ModelError>;

/// Invalid classifier model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A weight is NaN or infinite
    #[error("weight for {0} must be finite")]
    NonFiniteWeight(freshguard_core::ParameterId),

    /// Bias is NaN or infinite
    #[error("model bias must be finite")]
    NonFiniteBias,

    /// Decision threshold is NaN or infinite
    #[error("model threshold must be finite")]
    NonFiniteThreshold,
}
