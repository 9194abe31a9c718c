//! The scoring entry point: attributes in, verdict out.

use crate::config::AppConfig;
use crate::error::ScoringError;
use crate::feature_codec::{FeatureCodec, FeatureSchema};
use crate::gender::{GenderInferer, NameTable};
use crate::metrics::ScoringMetrics;
use crate::models::aggregator::{AggregationPolicy, ScoreAggregator};
use crate::models::ensemble::EnsembleDecision;
use crate::models::loader::ModelLoader;
use crate::models::registry::ModelRegistry;
use crate::screening::{self, Screening};
use crate::types::prediction::PredictionResult;
use crate::types::profile::ProfileAttributes;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Encodes a profile and asks the ensemble for a verdict.
///
/// Errors from either stage are returned unchanged; nothing is retried.
pub struct ProfileScoringService {
    codec: FeatureCodec,
    ensemble: EnsembleDecision,
    screening: Option<Screening>,
}

impl ProfileScoringService {
    pub fn new(codec: FeatureCodec, ensemble: EnsembleDecision) -> Self {
        Self {
            codec,
            ensemble,
            screening: None,
        }
    }

    /// Enable rule-based screening ahead of the models
    pub fn with_screening(mut self, screening: Screening) -> Self {
        self.screening = Some(screening);
        self
    }

    /// Build the service from configuration, preloading the default models
    /// when asked to.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.models.validate()?;

        let table = NameTable::from_path(&config.gender.table_path)
            .with_context(|| format!("Failed to load name table {}", config.gender.table_path))?;
        let inferer = GenderInferer::new(Arc::new(table))
            .with_suffix_fallback(config.gender.suffix_fallback);
        let schema = match &config.models.languages {
            Some(languages) => FeatureSchema::v1_with_languages(languages.clone()),
            None => FeatureSchema::v1(),
        };
        let codec = FeatureCodec::with_schema(schema, inferer);

        let loader = ModelLoader::new(&config.models.models_dir)
            .with_onnx_threads(config.models.onnx_threads);
        let registry = Arc::new(ModelRegistry::new(loader, codec.schema().clone()));

        let aggregator = match config.models.policy {
            AggregationPolicy::Weighted => ScoreAggregator::weighted(config.models.weights.clone()),
            policy => ScoreAggregator::new(policy),
        }
        .with_vote_threshold(config.models.threshold);

        let ensemble = EnsembleDecision::new(Arc::clone(&registry))
            .with_aggregator(aggregator)
            .with_default_models(config.models.default_models.clone())
            .with_threshold(config.models.threshold);

        if config.models.preload {
            let failures = registry.preload(&config.models.default_models);
            for failure in &failures {
                warn!(model = %failure.model_id, error = %failure.reason, "Model unavailable at startup");
            }
            info!(
                loaded = ?registry.loaded_models(),
                failed = failures.len(),
                "Model preload complete"
            );
        }

        let mut service = Self::new(codec, ensemble);
        if config.screening.enabled {
            info!(whitelist = config.screening.whitelist.len(), "Screening rules enabled");
            service = service.with_screening(Screening::new(&config.screening.whitelist));
        }

        Ok(service)
    }

    /// Score one profile.
    ///
    /// `models` selects the models to query; `None` uses the configured default set.
    pub fn score(
        &self,
        profile: &ProfileAttributes,
        models: Option<&[String]>,
    ) -> Result<PredictionResult, ScoringError> {
        let coerced = self.codec.coerce(profile)?;

        if let Some(screening) = &self.screening {
            if let Some(result) = screening.screen(profile.user_id.as_deref(), &coerced) {
                return Ok(result);
            }
        }

        let features = self.codec.vectorize(&coerced);
        debug!(
            user_id = profile.user_id.as_deref().unwrap_or("-"),
            features = features.len(),
            "Profile encoded"
        );

        let mut result = self.ensemble.decide(&features, models)?;
        result.reasons = screening::explain(&coerced);
        Ok(result)
    }

    pub fn codec(&self) -> &FeatureCodec {
        &self.codec
    }

    pub fn ensemble(&self) -> &EnsembleDecision {
        &self.ensemble
    }

    /// Attach metrics to the ensemble after construction
    pub fn with_metrics(mut self, metrics: Arc<ScoringMetrics>) -> Self {
        self.ensemble = self.ensemble.with_metrics(metrics);
        self
    }
}
