//! Prediction result returned for every scored profile

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Final classification of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Genuine,
    Fake,
}

impl Label {
    /// Classify a fake-probability against a threshold.
    ///
    /// A probability exactly on the threshold counts as fake.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Label::Fake
        } else {
            Label::Genuine
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Genuine => write!(f, "genuine"),
            Label::Fake => write!(f, "fake"),
        }
    }
}

/// A model that was requested but left out of the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedModel {
    pub model_id: String,
    pub reason: String,
}

/// What produced the final label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "rule")]
pub enum DecisionSource {
    /// Combined classifier probabilities
    Models,
    /// A deterministic screening rule short-circuited the models
    Screening(String),
}

/// Outcome of scoring one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    /// Probability (0.0 - 1.0) that the profile is fake
    pub confidence: f64,
    /// Raw probability of every model that contributed
    pub per_model_scores: BTreeMap<String, f64>,
    /// Requested models that could not be queried
    #[serde(default)]
    pub excluded: Vec<ExcludedModel>,
    pub decided_by: DecisionSource,
    /// Human-readable observations behind the verdict
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl PredictionResult {
    /// True when at least one requested model was excluded
    pub fn is_degraded(&self) -> bool {
        !self.excluded.is_empty()
    }

    pub fn is_fake(&self) -> bool {
        self.label == Label::Fake
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_threshold() {
        assert_eq!(Label::from_probability(0.49, 0.5), Label::Genuine);
        assert_eq!(Label::from_probability(0.5, 0.5), Label::Fake);
        assert_eq!(Label::from_probability(0.93, 0.5), Label::Fake);
    }

    #[test]
    fn test_prediction_serialization() {
        let mut scores = BTreeMap::new();
        scores.insert("svm".to_string(), 0.8);
        scores.insert("random_forest".to_string(), 0.6);

        let result = PredictionResult {
            label: Label::Fake,
            confidence: 0.7,
            per_model_scores: scores,
            excluded: vec![ExcludedModel {
                model_id: "neural_network".to_string(),
                reason: "file not found".to_string(),
            }],
            decided_by: DecisionSource::Models,
            reasons: Vec::new(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["label"], "fake");
        assert_eq!(json["decided_by"]["kind"], "models");
        assert_eq!(json["excluded"][0]["model_id"], "neural_network");
        assert!(json.get("reasons").is_none());

        let back: PredictionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
        assert!(back.is_degraded());
    }
}
