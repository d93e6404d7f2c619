//! Linear model parameters

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use freshguard_core::{Classification, ConditionClassifier, ParameterId, Reading};

use crate::{MLResult, ModelError};

/// Weights, bias and decision threshold of the spoilage model
///
/// Immutable once built; every number is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawClassifierModel")]
pub struct ClassifierModel {
    weights: BTreeMap<ParameterId, f64>,
    bias: f64,
    threshold: f64,
}

#[derive(Deserialize)]
struct RawClassifierModel {
    #[serde(default)]
    weights: BTreeMap<ParameterId, f64>,
    #[serde(default)]
    bias: f64,
    #[serde(default)]
    threshold: f64,
}

impl TryFrom<RawClassifierModel> for ClassifierModel {
    type Error = ModelError;

    fn try_from(raw: RawClassifierModel) -> MLResult<Self> {
        Self::new(raw.weights, raw.bias, raw.threshold)
    }
}

impl ClassifierModel {
    /// Build a model, rejecting non-finite numbers
    pub fn new(
        weights: impl IntoIterator<Item = (ParameterId, f64)>,
        bias: f64,
        threshold: f64,
    ) -> MLResult<Self> {
        let weights: BTreeMap<_, _> = weights.into_iter().collect();

        if let Some((&id, _)) = weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(ModelError::NonFiniteWeight(id));
        }
        if !bias.is_finite() {
            return Err(ModelError::NonFiniteBias);
        }
        if !threshold.is_finite() {
            return Err(ModelError::NonFiniteThreshold);
        }

        Ok(Self {
            weights,
            bias,
            threshold,
        })
    }

    /// Weight for `id`, zero when the model does not mention it
    pub fn weight(&self, id: ParameterId) -> f64 {
        self.weights.get(&id).copied().unwrap_or(0.0)
    }

    /// Constant term of the score
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Scores strictly above this are spoiled
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for ClassifierModel {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                (ParameterId::Ch4, 0.0141),
                (ParameterId::Mq135, -0.0353),
                (ParameterId::Voc, -0.0228),
                (ParameterId::Etoh, 0.0281),
                (ParameterId::Temperature, 0.0),
                (ParameterId::Humidity, 0.0),
            ]),
            bias: -0.0001,
            threshold: 0.0,
        }
    }
}

impl ConditionClassifier for ClassifierModel {
    fn classify(&self, reading: &Reading) -> Classification {
        crate::classifier::classify(reading.parameters(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_from_json() {
        let model: ClassifierModel = serde_json::from_str(
            r#"{"weights": {"ch4": 0.5, "etoh": 1.0}, "bias": 2.0, "threshold": 10.0}"#,
        )
        .unwrap();

        assert_eq!(model.weight(ParameterId::Ch4), 0.5);
        assert_eq!(model.weight(ParameterId::Humidity), 0.0);
        assert_eq!(model.bias(), 2.0);
        assert_eq!(model.threshold(), 10.0);
    }

    #[test]
    fn rejects_unknown_parameter() {
        let result: Result<ClassifierModel, _> =
            serde_json::from_str(r#"{"weights": {"pressure": 1.0}, "bias": 0, "threshold": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_finite() {
        assert_eq!(
            ClassifierModel::new([(ParameterId::Voc, f64::NAN)], 0.0, 0.0),
            Err(ModelError::NonFiniteWeight(ParameterId::Voc))
        );
        assert_eq!(
            ClassifierModel::new([], f64::INFINITY, 0.0),
            Err(ModelError::NonFiniteBias)
        );
        assert_eq!(
            ClassifierModel::new([], 0.0, f64::NEG_INFINITY),
            Err(ModelError::NonFiniteThreshold)
        );
    }

    #[test]
    fn default_round_trips_through_config() {
        let json = serde_json::to_string(&ClassifierModel::default()).unwrap();
        let back: ClassifierModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ClassifierModel::default());
    }
}
