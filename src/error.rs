//! Error types for the profile scoring pipeline.
//!
//! Each stage has its own error so callers can tell bad input apart from a
//! bad artifact or a request where no model could answer.

use thiserror::Error;

/// A profile attribute could not be coerced into its feature slot.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid attribute `{field}`: {reason}")]
pub struct SchemaError {
    /// Attribute name as it appears in the request
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A model artifact is missing, corrupt, or incompatible with the codec.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to load model `{model_id}`: {reason}")]
pub struct ModelLoadError {
    pub model_id: String,
    pub reason: String,
}

impl ModelLoadError {
    pub fn new(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }
}

/// A loaded model rejected a feature vector at call time.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("inference failed for model `{model_id}`: {reason}")]
pub struct InferenceError {
    pub model_id: String,
    pub reason: String,
}

impl InferenceError {
    pub fn new(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }
}

/// Why a single model was left out of an ensemble decision.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelFailure {
    #[error(transparent)]
    Load(#[from] ModelLoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ModelFailure {
    pub fn model_id(&self) -> &str {
        match self {
            ModelFailure::Load(e) => &e.model_id,
            ModelFailure::Inference(e) => &e.model_id,
        }
    }
}

/// No requested model produced a probability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnsembleError {
    #[error("no models were requested")]
    EmptySelection,

    #[error("all {} requested models failed: {}", .failures.len(), join_failures(.failures))]
    AllModelsFailed { failures: Vec<ModelFailure> },
}

fn join_failures(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by [`crate::service::ProfileScoringService::score`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Ensemble(#[from] EnsembleError),
}
