//! Type definitions for the profile scoring pipeline

pub mod prediction;
pub mod profile;
pub mod report;

pub use prediction::{DecisionSource, ExcludedModel, Label, PredictionResult};
pub use profile::{AttributeValue, ProfileAttributes};
pub use report::{ReportError, ReportErrorKind, ScoreReport, ScoreRequest};
