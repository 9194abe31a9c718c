//! Score aggregation for multi-model ensemble

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// How per-model probabilities are combined into one confidence
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPolicy {
    /// Unweighted arithmetic mean
    #[default]
    Mean,
    /// Weighted mean using configured per-model weights
    Weighted,
    Median,
    /// Most suspicious model wins
    Max,
    /// Fraction of models at or above the decision threshold
    Vote,
}

/// Aggregates scores from multiple models into a single fake probability.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    policy: AggregationPolicy,
    /// Model weights for the weighted policy
    weights: HashMap<String, f64>,
    /// Weight for models not in the weights map
    default_weight: f64,
    /// Threshold used by the vote policy
    vote_threshold: f64,
}

impl ScoreAggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self {
            policy,
            weights: HashMap::new(),
            default_weight: 1.0,
            vote_threshold: 0.5,
        }
    }

    /// Weighted mean with the given model weights.
    pub fn weighted(weights: HashMap<String, f64>) -> Self {
        Self {
            weights,
            ..Self::new(AggregationPolicy::Weighted)
        }
    }

    pub fn with_vote_threshold(mut self, threshold: f64) -> Self {
        self.vote_threshold = threshold;
        self
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Combine model scores, `None` when there are no scores.
    pub fn aggregate(&self, model_scores: &BTreeMap<String, f64>) -> Option<f64> {
        if model_scores.is_empty() {
            return None;
        }

        let combined = match self.policy {
            AggregationPolicy::Mean => Self::mean_score(model_scores),
            AggregationPolicy::Weighted => self.weighted_score(model_scores),
            AggregationPolicy::Median => Self::median_score(model_scores),
            AggregationPolicy::Max => Self::max_score(model_scores),
            AggregationPolicy::Vote => Self::voting_score(model_scores, self.vote_threshold),
        };

        Some(combined.clamp(0.0, 1.0))
    }

    pub fn mean_score(model_scores: &BTreeMap<String, f64>) -> f64 {
        model_scores.values().sum::<f64>() / model_scores.len() as f64
    }

    /// Weighted average where weights are normalized to sum to 1.
    ///
    /// Falls back to the plain mean when every weight is zero.
    fn weighted_score(&self, model_scores: &BTreeMap<String, f64>) -> f64 {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for (model_name, &score) in model_scores {
            let weight = self
                .weights
                .get(model_name)
                .copied()
                .unwrap_or(self.default_weight)
                .max(0.0);

            weighted_sum += score * weight;
            total_weight += weight;
        }

        if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            Self::mean_score(model_scores)
        }
    }

    /// Get the maximum score among all models.
    pub fn max_score(model_scores: &BTreeMap<String, f64>) -> f64 {
        model_scores.values().copied().fold(0.0, f64::max)
    }

    /// Get the median score among all models.
    pub fn median_score(model_scores: &BTreeMap<String, f64>) -> f64 {
        let mut scores: Vec<f64> = model_scores.values().copied().collect();
        scores.sort_by(f64::total_cmp);

        let mid = scores.len() / 2;
        if scores.len() % 2 == 0 {
            (scores[mid - 1] + scores[mid]) / 2.0
        } else {
            scores[mid]
        }
    }

    /// Calculate voting-based score (fraction of models above threshold).
    pub fn voting_score(model_scores: &BTreeMap<String, f64>, threshold: f64) -> f64 {
        let votes_for_fake = model_scores
            .values()
            .filter(|&&score| score >= threshold)
            .count();

        votes_for_fake as f64 / model_scores.len() as f64
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(AggregationPolicy::Mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_mean_is_default() {
        let aggregator = ScoreAggregator::default();
        assert_eq!(aggregator.policy(), AggregationPolicy::Mean);

        let combined = aggregator
            .aggregate(&scores(&[("random_forest", 0.9), ("svm", 0.3)]))
            .unwrap();
        assert!((combined - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_aggregation() {
        let mut weights = HashMap::new();
        weights.insert("random_forest".to_string(), 3.0);
        weights.insert("svm".to_string(), 1.0);
        let aggregator = ScoreAggregator::weighted(weights);

        let combined = aggregator
            .aggregate(&scores(&[("random_forest", 0.8), ("svm", 0.4)]))
            .unwrap();
        // (0.8*3 + 0.4*1) / 4
        assert!((combined - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_all_zero_falls_back_to_mean() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.0);
        weights.insert("b".to_string(), 0.0);
        let aggregator = ScoreAggregator::weighted(weights);

        let combined = aggregator.aggregate(&scores(&[("a", 1.0), ("b", 0.0)])).unwrap();
        assert!((combined - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_voting_score() {
        let s = scores(&[("m1", 0.8), ("m2", 0.6), ("m3", 0.4), ("m4", 0.3)]);

        // 2 out of 4 models at or above 0.5
        let vote = ScoreAggregator::voting_score(&s, 0.5);
        assert!((vote - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_median_and_max() {
        let odd = scores(&[("m1", 0.9), ("m2", 0.7), ("m3", 0.5), ("m4", 0.3), ("m5", 0.1)]);
        assert!((ScoreAggregator::median_score(&odd) - 0.5).abs() < 1e-12);
        assert_eq!(ScoreAggregator::max_score(&odd), 0.9);

        let even = scores(&[("m1", 0.2), ("m2", 0.6)]);
        assert!((ScoreAggregator::median_score(&even) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_scores() {
        assert_eq!(ScoreAggregator::default().aggregate(&BTreeMap::new()), None);
    }
}
