//! Fake Profile Detector Library
//!
//! Scores social-network profiles as genuine or fake with an ensemble of
//! pre-trained classifiers, served over NATS.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_codec;
pub mod gender;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod screening;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use consumer::ProfileRequestConsumer;
pub use error::{EnsembleError, InferenceError, ModelLoadError, SchemaError, ScoringError};
pub use feature_codec::{FeatureCodec, FeatureSchema, FeatureVector};
pub use gender::{GenderInferer, GenderLabel, NameTable};
pub use models::{EnsembleDecision, ModelRegistry};
pub use producer::ReportProducer;
pub use service::ProfileScoringService;
pub use types::{Label, PredictionResult, ProfileAttributes, ScoreReport, ScoreRequest};
