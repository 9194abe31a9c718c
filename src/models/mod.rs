//! Model artifacts, classifier families, and the ensemble that combines them

pub mod aggregator;
pub mod artifact;
pub mod classifier;
pub mod ensemble;
pub mod forest;
pub mod loader;
pub mod network;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod registry;
pub mod svm;

pub use aggregator::{AggregationPolicy, ScoreAggregator};
pub use artifact::{ArtifactSchema, ModelArtifact, ModelFamily};
pub use classifier::Classifier;
pub use ensemble::{EnsembleDecision, DECISION_THRESHOLD, DEFAULT_MODELS};
pub use loader::ModelLoader;
pub use registry::{ModelHandle, ModelRegistry};
