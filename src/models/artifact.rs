//! On-disk model artifact format
//!
//! An artifact is a JSON document written by the training job:
//!
//! ```json
//! {
//!   "model_id": "random_forest",
//!   "family": "random_forest",
//!   "version": "2024-05-01",
//!   "schema": {
//!     "version": 1,
//!     "feature_names": ["statuses_count", "..."],
//!     "languages": ["en", "es", "..."]
//!   },
//!   "params": { "trees": [ ... ] }
//! }
//! ```

use crate::feature_codec::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier family of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    Svm,
    NeuralNetwork,
    Onnx,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::Svm => "svm",
            ModelFamily::NeuralNetwork => "neural_network",
            ModelFamily::Onnx => "onnx",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random_forest" => Ok(ModelFamily::RandomForest),
            "svm" => Ok(ModelFamily::Svm),
            "neural_network" | "mlp" => Ok(ModelFamily::NeuralNetwork),
            "onnx" => Ok(ModelFamily::Onnx),
            other => Err(format!("unsupported model family {other:?}")),
        }
    }
}

/// Feature layout a model was trained against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSchema {
    pub version: u32,
    pub feature_names: Vec<String>,
    /// Language table behind `lang_code`, in code order
    #[serde(default)]
    pub languages: Vec<String>,
}

impl ArtifactSchema {
    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }

    /// Describe the first incompatibility with the codec's schema, if any
    pub fn mismatch(&self, expected: &FeatureSchema) -> Option<String> {
        if self.version != expected.version {
            return Some(format!(
                "schema version {} does not match codec schema version {}",
                self.version, expected.version
            ));
        }
        if self.len() != expected.len() {
            return Some(format!(
                "artifact expects {} features, codec produces {}",
                self.len(),
                expected.len()
            ));
        }
        if let Some((i, (got, want))) = self
            .feature_names
            .iter()
            .zip(&expected.feature_names)
            .enumerate()
            .find(|(_, (got, want))| got != want)
        {
            return Some(format!(
                "feature {i} is {got:?} in the artifact but {want:?} in the codec"
            ));
        }
        self.language_mismatch(&expected.languages)
    }

    fn language_mismatch(&self, expected: &[String]) -> Option<String> {
        if self.languages.is_empty() {
            return Some("artifact does not declare its language table".to_string());
        }
        if self.languages.len() != expected.len() {
            return Some(format!(
                "artifact knows {} languages, codec knows {}",
                self.languages.len(),
                expected.len()
            ));
        }
        self.languages
            .iter()
            .zip(expected)
            .enumerate()
            .find(|(_, (got, want))| !got.eq_ignore_ascii_case(want))
            .map(|(i, (got, want))| {
                format!(
                    "lang_code {} is {got:?} in the artifact but {want:?} in the codec",
                    i + 1
                )
            })
    }
}

impl From<&FeatureSchema> for ArtifactSchema {
    fn from(schema: &FeatureSchema) -> Self {
        Self {
            version: schema.version,
            feature_names: schema.feature_names.clone(),
            languages: schema.languages.clone(),
        }
    }
}

/// Serialized classifier plus the schema it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_id: String,
    /// Family name; parsed separately so an unknown family is a load error
    pub family: String,
    #[serde(default)]
    pub version: String,
    pub schema: ArtifactSchema,
    /// Family-specific parameters
    pub params: serde_json::Value,
}
