//! Scoring a reading against a [`ClassifierModel`]

use freshguard_core::constants::{CONFIDENCE_CAP, CONFIDENCE_DIVISOR};
use freshguard_core::{Classification, ParameterId, ParameterMap};

use crate::model::ClassifierModel;

/// Score `parameters` with `model`
///
/// Terms are summed in [`ParameterId::ALL`] order so the result is
/// bit-for-bit reproducible.
pub fn classify(parameters: &ParameterMap, model: &ClassifierModel) -> Classification {
    let score = ParameterId::ALL.iter().fold(model.bias(), |acc, &id| {
        match parameters.get(&id) {
            Some(value) => acc + value * model.weight(id),
            None => acc,
        }
    });

    let threshold = model.threshold();
    let is_bad = score > threshold;
    let confidence = ((score - threshold).abs() / CONFIDENCE_DIVISOR).min(CONFIDENCE_CAP);

    log::trace!("spoilage score {:.4} (threshold {}, bad: {})", score, threshold, is_bad);

    Classification {
        is_bad,
        score,
        confidence,
        threshold,
    }
}
