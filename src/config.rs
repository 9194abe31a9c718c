//! Configuration management for the profile scoring service

use crate::models::aggregator::AggregationPolicy;
use crate::models::ensemble::{DECISION_THRESHOLD, DEFAULT_MODELS};
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub gender: GenderConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming score requests
    pub request_subject: String,
    /// Subject for reports when the request carries no reply subject
    pub verdict_subject: String,
    /// Queue group shared by worker instances
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Model registry and ensemble configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing model artifacts
    pub models_dir: String,
    /// Models queried when a request names none
    #[serde(default = "default_models")]
    pub default_models: Vec<String>,
    /// How per-model probabilities are combined
    #[serde(default)]
    pub policy: AggregationPolicy,
    /// Model weights for the weighted policy
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    /// Probability at or above which a profile is fake
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Load the default models at startup
    #[serde(default = "default_preload")]
    pub preload: bool,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Language table exported with the artifacts; the built-in table when unset
    #[serde(default)]
    pub languages: Option<Vec<String>>,
}

impl ModelsConfig {
    /// Reject values the ensemble cannot decide with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.threshold.is_finite() && (0.0..=1.0).contains(&self.threshold),
            "models.threshold must be within [0, 1], got {}",
            self.threshold
        );
        for (model_id, weight) in &self.weights {
            ensure!(
                weight.is_finite() && *weight >= 0.0,
                "models.weights.{model_id} must be a non-negative number, got {weight}"
            );
        }
        if let Some(languages) = &self.languages {
            ensure!(!languages.is_empty(), "models.languages must not be empty");
        }
        Ok(())
    }
}

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|s| s.to_string()).collect()
}

fn default_threshold() -> f64 {
    DECISION_THRESHOLD
}

fn default_preload() -> bool {
    true
}

fn default_onnx_threads() -> usize {
    1
}

/// Name table used for gender inference
#[derive(Debug, Clone, Deserialize)]
pub struct GenderConfig {
    /// CSV with `name,gender` rows
    pub table_path: String,
    /// Guess from name endings when the table has no entry
    #[serde(default)]
    pub suffix_fallback: bool,
}

impl Default for GenderConfig {
    fn default() -> Self {
        Self {
            table_path: "data/names.csv".to_string(),
            suffix_fallback: false,
        }
    }
}

/// Rule-based screening ahead of the models
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreeningConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Account handles always treated as genuine
    #[serde(default)]
    pub whitelist: Vec<String>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests scored concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// `FPD_`-prefixed environment variables override file values, e.g.
    /// `FPD_NATS__URL=nats://broker:4222`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FPD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.models.validate()?;
        ensure!(self.pipeline.workers > 0, "pipeline.workers must be at least 1");
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "profiles.score".to_string(),
                verdict_subject: "profiles.verdicts".to_string(),
                queue_group: Some("profile-scorers".to_string()),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                default_models: default_models(),
                policy: AggregationPolicy::Mean,
                weights: HashMap::new(),
                threshold: DECISION_THRESHOLD,
                preload: true,
                onnx_threads: 1,
                languages: None,
            },
            gender: GenderConfig::default(),
            screening: ScreeningConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}
