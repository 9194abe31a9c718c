//! Model artifact loader

use crate::error::ModelLoadError;
use crate::feature_codec::FeatureSchema;
use crate::models::artifact::{ModelArtifact, ModelFamily};
use crate::models::classifier::Classifier;
use crate::models::forest::{RandomForest, RandomForestParams};
use crate::models::network::{NeuralNetwork, NeuralNetworkParams};
use crate::models::registry::ModelHandle;
use crate::models::svm::{Svm, SvmParams};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads artifacts from disk and builds classifiers from them
#[derive(Debug, Clone)]
pub struct ModelLoader {
    models_dir: PathBuf,
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new<P: Into<PathBuf>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.into(),
            onnx_threads: 1,
        }
    }

    pub fn with_onnx_threads(mut self, onnx_threads: usize) -> Self {
        self.onnx_threads = onnx_threads.max(1);
        self
    }

    pub fn onnx_threads(&self) -> usize {
        self.onnx_threads
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path of the artifact for a model identifier
    pub fn artifact_path(&self, model_id: &str) -> PathBuf {
        self.models_dir.join(format!("{model_id}.json"))
    }

    /// Load and validate one artifact against the codec's schema
    pub fn load_model(
        &self,
        model_id: &str,
        expected: &FeatureSchema,
    ) -> Result<ModelHandle, ModelLoadError> {
        validate_model_id(model_id)?;

        let path = self.artifact_path(model_id);
        info!(model = %model_id, path = %path.display(), "Loading model artifact");

        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModelLoadError::new(
                model_id,
                format!("artifact not found at {}", path.display()),
            ),
            _ => ModelLoadError::new(
                model_id,
                format!("failed to read {}: {}", path.display(), e),
            ),
        })?;

        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| ModelLoadError::new(model_id, format!("corrupt artifact: {e}")))?;

        if artifact.model_id != model_id {
            return Err(ModelLoadError::new(
                model_id,
                format!("artifact declares model id {:?}", artifact.model_id),
            ));
        }

        if let Some(mismatch) = artifact.schema.mismatch(expected) {
            return Err(ModelLoadError::new(model_id, mismatch));
        }

        let family: ModelFamily = artifact
            .family
            .parse()
            .map_err(|e: String| ModelLoadError::new(model_id, e))?;

        let classifier = self
            .build_classifier(family, artifact.params, expected.len())
            .map_err(|e| ModelLoadError::new(model_id, format!("invalid {family} parameters: {e:#}")))?;

        info!(
            model = %model_id,
            family = %family,
            version = %artifact.version,
            features = expected.len(),
            "Model loaded successfully"
        );

        Ok(ModelHandle::new(
            model_id.to_string(),
            artifact.version,
            artifact.schema,
            classifier,
        ))
    }

    fn build_classifier(
        &self,
        family: ModelFamily,
        params: serde_json::Value,
        n_features: usize,
    ) -> anyhow::Result<Box<dyn Classifier>> {
        Ok(match family {
            ModelFamily::RandomForest => Box::new(RandomForest::from_params(
                parse_params::<RandomForestParams>(params)?,
                n_features,
            )?),
            ModelFamily::Svm => Box::new(Svm::from_params(
                parse_params::<SvmParams>(params)?,
                n_features,
            )?),
            ModelFamily::NeuralNetwork => Box::new(NeuralNetwork::from_params(
                parse_params::<NeuralNetworkParams>(params)?,
                n_features,
            )?),
            #[cfg(feature = "onnx")]
            ModelFamily::Onnx => Box::new(crate::models::onnx::OnnxClassifier::load(
                parse_params(params)?,
                &self.models_dir,
                n_features,
                self.onnx_threads,
            )?),
            #[cfg(not(feature = "onnx"))]
            ModelFamily::Onnx => {
                anyhow::bail!("onnx models require the `onnx` feature")
            }
        })
    }
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> anyhow::Result<T> {
    Ok(serde_json::from_value(params)?)
}

/// Identifiers become file names, so only a conservative character set is accepted
fn validate_model_id(model_id: &str) -> Result<(), ModelLoadError> {
    let valid = !model_id.is_empty()
        && !model_id.starts_with('.')
        && model_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ModelLoadError::new(model_id, "invalid model identifier"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::ArtifactSchema;
    use serde_json::json;

    fn write_artifact(dir: &Path, model_id: &str, body: serde_json::Value) {
        std::fs::write(dir.join(format!("{model_id}.json")), body.to_string()).unwrap();
    }

    fn forest_artifact(model_id: &str, schema: &FeatureSchema) -> serde_json::Value {
        json!({
            "model_id": model_id,
            "family": "random_forest",
            "version": "test",
            "schema": ArtifactSchema::from(schema),
            "params": {"trees": [{"nodes": [{"fake_probability": 0.25}]}]}
        })
    }

    #[test]
    fn test_loads_valid_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FeatureSchema::v1();
        write_artifact(dir.path(), "rf", forest_artifact("rf", &schema));

        let handle = ModelLoader::new(dir.path()).load_model("rf", &schema).unwrap();
        assert_eq!(handle.model_id(), "rf");
        assert_eq!(handle.family(), ModelFamily::RandomForest);
        assert_eq!(handle.version(), "test");
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelLoader::new(dir.path())
            .load_model("svm", &FeatureSchema::v1())
            .unwrap_err();
        assert_eq!(err.model_id, "svm");
        assert!(err.reason.contains("not found"));
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rf.json"), b"{ not json").unwrap();
        let err = ModelLoader::new(dir.path())
            .load_model("rf", &FeatureSchema::v1())
            .unwrap_err();
        assert!(err.reason.contains("corrupt"));
    }

    #[test]
    fn test_schema_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FeatureSchema::v1();
        let mut short = schema.clone();
        short.feature_names.truncate(10);
        write_artifact(dir.path(), "rf", forest_artifact("rf", &short));

        let err = ModelLoader::new(dir.path()).load_model("rf", &schema).unwrap_err();
        assert!(err.reason.contains("expects 10 features"));
    }

    #[test]
    fn test_language_table_must_match_codec() {
        let dir = tempfile::tempdir().unwrap();
        let trained = FeatureSchema::v1_with_languages(
            ["es", "en", "pt"].iter().map(|s| s.to_string()).collect(),
        );
        write_artifact(dir.path(), "rf", forest_artifact("rf", &trained));
        let loader = ModelLoader::new(dir.path());

        let err = loader.load_model("rf", &FeatureSchema::v1()).unwrap_err();
        assert!(err.reason.contains("languages"), "{}", err.reason);

        let handle = loader.load_model("rf", &trained).unwrap();
        assert_eq!(handle.schema().languages, vec!["es", "en", "pt"]);
    }

    #[test]
    fn test_unknown_family_and_bad_params() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FeatureSchema::v1();

        let mut unknown = forest_artifact("gb", &schema);
        unknown["family"] = json!("gradient_boosting");
        write_artifact(dir.path(), "gb", unknown);
        let err = ModelLoader::new(dir.path()).load_model("gb", &schema).unwrap_err();
        assert!(err.reason.contains("unsupported model family"));

        let mut bad = forest_artifact("rf", &schema);
        bad["params"] = json!({"trees": []});
        write_artifact(dir.path(), "rf", bad);
        let err = ModelLoader::new(dir.path()).load_model("rf", &schema).unwrap_err();
        assert!(err.reason.contains("invalid random_forest parameters"));
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let loader = ModelLoader::new("models");
        for id in ["", "../secret", "a/b", ".hidden"] {
            assert!(loader.load_model(id, &FeatureSchema::v1()).is_err(), "{id}");
        }
    }

    #[test]
    fn test_declared_id_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FeatureSchema::v1();
        write_artifact(dir.path(), "svm", forest_artifact("rf", &schema));

        let err = ModelLoader::new(dir.path()).load_model("svm", &schema).unwrap_err();
        assert!(err.reason.contains("declares model id"));
    }
}
