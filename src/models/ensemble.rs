//! Multi-model decision over a single feature vector

use crate::error::{EnsembleError, ModelFailure};
use crate::feature_codec::FeatureVector;
use crate::metrics::ScoringMetrics;
use crate::models::aggregator::ScoreAggregator;
use crate::models::registry::ModelRegistry;
use crate::types::prediction::{DecisionSource, ExcludedModel, Label, PredictionResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Probability at or above which a profile is labelled fake.
///
/// A combined score of exactly 0.5 is labelled fake: flagging a genuine
/// profile for review is preferred over missing a fake one.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Models queried when a request does not name any
pub const DEFAULT_MODELS: [&str; 3] = ["random_forest", "svm", "neural_network"];

/// Queries models through the registry and combines their probabilities
pub struct EnsembleDecision {
    registry: Arc<ModelRegistry>,
    aggregator: ScoreAggregator,
    default_models: Vec<String>,
    threshold: f64,
    metrics: Option<Arc<ScoringMetrics>>,
}

impl EnsembleDecision {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            aggregator: ScoreAggregator::default(),
            default_models: DEFAULT_MODELS.iter().map(|s| s.to_string()).collect(),
            threshold: DECISION_THRESHOLD,
            metrics: None,
        }
    }

    pub fn with_aggregator(mut self, aggregator: ScoreAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_default_models(mut self, models: Vec<String>) -> Self {
        self.default_models = models;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Record per-model inference times
    pub fn with_metrics(mut self, metrics: Arc<ScoringMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn default_models(&self) -> &[String] {
        &self.default_models
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a feature vector with the selected models (default set when `None`).
    ///
    /// Models that fail to load or run are excluded and reported; the request
    /// only fails when no model produced a probability.
    pub fn decide(
        &self,
        features: &FeatureVector,
        selection: Option<&[String]>,
    ) -> Result<PredictionResult, EnsembleError> {
        let requested = dedup(selection.unwrap_or(&self.default_models));
        if requested.is_empty() {
            return Err(EnsembleError::EmptySelection);
        }

        let mut model_scores = BTreeMap::new();
        let mut failures = Vec::new();

        for model_id in &requested {
            match self.query(model_id, features) {
                Ok(score) => {
                    model_scores.insert(model_id.to_string(), score);
                }
                Err(failure) => {
                    warn!(model = %model_id, error = %failure, "Model excluded from decision");
                    failures.push(failure);
                }
            }
        }

        // a lone surviving model is its own confidence, whatever the policy
        let confidence = if model_scores.len() == 1 {
            model_scores.values().copied().next()
        } else {
            self.aggregator.aggregate(&model_scores)
        };

        let Some(confidence) = confidence else {
            return Err(EnsembleError::AllModelsFailed { failures });
        };

        let label = Label::from_probability(confidence, self.threshold);

        debug!(
            confidence = confidence,
            label = %label,
            model_scores = ?model_scores,
            excluded = failures.len(),
            "Ensemble decision complete"
        );

        Ok(PredictionResult {
            label,
            confidence,
            per_model_scores: model_scores,
            excluded: failures
                .iter()
                .map(|f| ExcludedModel {
                    model_id: f.model_id().to_string(),
                    reason: f.to_string(),
                })
                .collect(),
            decided_by: DecisionSource::Models,
            reasons: Vec::new(),
        })
    }

    fn query(&self, model_id: &str, features: &FeatureVector) -> Result<f64, ModelFailure> {
        let handle = self.registry.load(model_id)?;

        let start = Instant::now();
        let score = self.registry.predict_probability(&handle, features)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_model_time(model_id, start.elapsed());
        }

        Ok(score)
    }
}

/// Drop repeated identifiers, keeping first occurrence order
fn dedup(ids: &[String]) -> Vec<&str> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_codec::FeatureSchema;
    use crate::models::aggregator::AggregationPolicy;
    use crate::models::artifact::ArtifactSchema;
    use crate::models::loader::ModelLoader;
    use serde_json::json;
    use std::path::Path;

    fn write_constant(dir: &Path, model_id: &str, probability: f64) {
        let body = json!({
            "model_id": model_id,
            "family": "random_forest",
            "version": "1",
            "schema": ArtifactSchema::from(&FeatureSchema::v1()),
            "params": {"trees": [{"nodes": [{"fake_probability": probability}]}]}
        });
        std::fs::write(dir.join(format!("{model_id}.json")), body.to_string()).unwrap();
    }

    fn ensemble(dir: &Path) -> EnsembleDecision {
        let registry = ModelRegistry::new(ModelLoader::new(dir), FeatureSchema::v1());
        EnsembleDecision::new(Arc::new(registry))
    }

    fn zeros() -> FeatureVector {
        FeatureVector {
            schema_version: 1,
            values: vec![0.0; 14],
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_model_threshold() {
        let dir = tempfile::tempdir().unwrap();
        write_constant(dir.path(), "low", 0.49);
        write_constant(dir.path(), "tie", 0.5);
        write_constant(dir.path(), "high", 0.51);
        let ensemble = ensemble(dir.path());

        let low = ensemble.decide(&zeros(), Some(&ids(&["low"]))).unwrap();
        assert_eq!(low.label, Label::Genuine);
        assert_eq!(low.confidence, 0.49);

        let tie = ensemble.decide(&zeros(), Some(&ids(&["tie"]))).unwrap();
        assert_eq!(tie.label, Label::Fake);
        assert_eq!(tie.confidence, 0.5);

        let high = ensemble.decide(&zeros(), Some(&ids(&["high"]))).unwrap();
        assert_eq!(high.label, Label::Fake);
    }

    #[test]
    fn test_unweighted_mean() {
        let dir = tempfile::tempdir().unwrap();
        write_constant(dir.path(), "a", 0.9);
        write_constant(dir.path(), "b", 0.3);
        let ensemble = ensemble(dir.path());

        let result = ensemble.decide(&zeros(), Some(&ids(&["a", "b"]))).unwrap();
        assert!((result.confidence - 0.6).abs() < 1e-12);
        assert_eq!(result.label, Label::Fake);
        assert_eq!(result.per_model_scores.len(), 2);
        assert_eq!(result.per_model_scores["a"], 0.9);
        assert!(!result.is_degraded());
    }

    #[test]
    fn test_partial_failure_degrades() {
        let dir = tempfile::tempdir().unwrap();
        write_constant(dir.path(), "random_forest", 0.2);
        write_constant(dir.path(), "svm", 0.4);
        let ensemble = ensemble(dir.path());

        let result = ensemble.decide(&zeros(), None).unwrap();
        assert!((result.confidence - 0.3).abs() < 1e-12);
        assert_eq!(result.label, Label::Genuine);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].model_id, "neural_network");
    }

    #[test]
    fn test_all_failed() {
        let dir = tempfile::tempdir().unwrap();
        let ensemble = ensemble(dir.path());

        match ensemble.decide(&zeros(), None) {
            Err(EnsembleError::AllModelsFailed { failures }) => assert_eq!(failures.len(), 3),
            other => panic!("expected AllModelsFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_inference_failure_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write_constant(dir.path(), "a", 0.9);
        let ensemble = ensemble(dir.path());

        let short = FeatureVector {
            schema_version: 1,
            values: vec![0.0; 3],
        };
        match ensemble.decide(&short, Some(&ids(&["a"]))) {
            Err(EnsembleError::AllModelsFailed { failures }) => {
                assert!(matches!(failures[0], ModelFailure::Inference(_)));
            }
            other => panic!("expected AllModelsFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_and_duplicate_selection() {
        let dir = tempfile::tempdir().unwrap();
        write_constant(dir.path(), "a", 0.8);
        let ensemble = ensemble(dir.path());

        assert_eq!(
            ensemble.decide(&zeros(), Some(&[])),
            Err(EnsembleError::EmptySelection)
        );

        let result = ensemble.decide(&zeros(), Some(&ids(&["a", "a", " a "]))).unwrap();
        assert_eq!(result.per_model_scores.len(), 1);
        assert_eq!(ensemble.registry().load_count(), 1);
    }

    #[test]
    fn test_lone_survivor_ignores_vote_policy() {
        let dir = tempfile::tempdir().unwrap();
        write_constant(dir.path(), "a", 0.3);
        let ensemble = ensemble(dir.path())
            .with_aggregator(ScoreAggregator::new(AggregationPolicy::Vote));

        let result = ensemble.decide(&zeros(), Some(&ids(&["a", "missing"]))).unwrap();
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.excluded[0].model_id, "missing");
    }
}
