//! Load-once cache of model artifacts keyed by model identifier.
//!
//! Each identifier owns a slot that is either `Loading` or `Ready`. The first
//! caller for an identifier marks the slot `Loading` and reads the artifact
//! outside the lock; concurrent callers for the same identifier block on a
//! condition variable until the slot becomes `Ready` and then share the same
//! handle. A failed load clears the slot so a later request can try again.

use crate::error::{InferenceError, ModelLoadError};
use crate::feature_codec::{FeatureSchema, FeatureVector};
use crate::models::artifact::{ArtifactSchema, ModelFamily};
use crate::models::classifier::Classifier;
use crate::models::loader::ModelLoader;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

/// An immutable, loaded model
#[derive(Debug)]
pub struct ModelHandle {
    model_id: String,
    version: String,
    schema: ArtifactSchema,
    classifier: Box<dyn Classifier>,
}

impl ModelHandle {
    pub fn new(
        model_id: String,
        version: String,
        schema: ArtifactSchema,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            model_id,
            version,
            schema,
            classifier,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn family(&self) -> ModelFamily {
        self.classifier.family()
    }

    pub fn schema(&self) -> &ArtifactSchema {
        &self.schema
    }

    /// Probability (0.0 - 1.0) that the profile is fake.
    ///
    /// The vector is checked against the model's schema on every call.
    pub fn predict_probability(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        if features.schema_version != self.schema.version {
            return Err(InferenceError::new(
                &self.model_id,
                format!(
                    "feature vector has schema version {}, model expects {}",
                    features.schema_version, self.schema.version
                ),
            ));
        }

        let expected = self.classifier.input_len();
        if features.len() != expected || features.len() != self.schema.len() {
            return Err(InferenceError::new(
                &self.model_id,
                format!("expected {} features, got {}", expected, features.len()),
            ));
        }

        let probability = self
            .classifier
            .predict_proba(features.as_slice())
            .map_err(|e| InferenceError::new(&self.model_id, format!("{e:#}")))?;

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::new(
                &self.model_id,
                format!("model returned invalid probability {probability}"),
            ));
        }

        Ok(probability)
    }
}

enum Slot {
    Loading,
    Ready(Arc<ModelHandle>),
}

/// Clears a `Loading` slot if the loader unwinds before publishing
struct LoadingGuard<'a> {
    registry: &'a ModelRegistry,
    model_id: &'a str,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slots = self.registry.lock_slots();
            slots.remove(self.model_id);
            self.registry.slot_changed.notify_all();
        }
    }
}

/// Owns every loaded model for the lifetime of the process
pub struct ModelRegistry {
    loader: ModelLoader,
    schema: FeatureSchema,
    slots: Mutex<HashMap<String, Slot>>,
    slot_changed: Condvar,
    /// Number of artifact reads attempted
    loads: AtomicU64,
}

impl ModelRegistry {
    /// Create a registry that validates artifacts against `schema`
    pub fn new(loader: ModelLoader, schema: FeatureSchema) -> Self {
        Self {
            loader,
            schema,
            slots: Mutex::new(HashMap::new()),
            slot_changed: Condvar::new(),
            loads: AtomicU64::new(0),
        }
    }

    /// Get the handle for a model, loading its artifact on first use.
    ///
    /// Repeated calls return the same `Arc` without touching the disk.
    pub fn load(&self, model_id: &str) -> Result<Arc<ModelHandle>, ModelLoadError> {
        let mut slots = self.lock_slots();
        loop {
            let in_flight = match slots.get(model_id) {
                Some(Slot::Ready(handle)) => return Ok(Arc::clone(handle)),
                Some(Slot::Loading) => true,
                None => false,
            };
            if !in_flight {
                break;
            }
            debug!(model = %model_id, "Waiting for in-flight model load");
            slots = self
                .slot_changed
                .wait(slots)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        slots.insert(model_id.to_string(), Slot::Loading);
        drop(slots);

        let mut guard = LoadingGuard {
            registry: self,
            model_id,
            armed: true,
        };

        self.loads.fetch_add(1, Ordering::Relaxed);
        let result = self
            .loader
            .load_model(model_id, &self.schema)
            .map(Arc::new);

        guard.armed = false;
        let mut slots = self.lock_slots();
        match &result {
            Ok(handle) => {
                slots.insert(model_id.to_string(), Slot::Ready(Arc::clone(handle)));
            }
            Err(e) => {
                warn!(model = %model_id, error = %e, "Model load failed");
                slots.remove(model_id);
            }
        }
        self.slot_changed.notify_all();

        result
    }

    /// Run a loaded model on a feature vector
    pub fn predict_probability(
        &self,
        handle: &ModelHandle,
        features: &FeatureVector,
    ) -> Result<f64, InferenceError> {
        handle.predict_probability(features)
    }

    /// Load several models up front, returning the failures
    pub fn preload<S: AsRef<str>>(&self, model_ids: &[S]) -> Vec<ModelLoadError> {
        model_ids
            .iter()
            .filter_map(|id| self.load(id.as_ref()).err())
            .collect()
    }

    /// Identifiers of models currently ready
    pub fn loaded_models(&self) -> Vec<String> {
        let slots = self.lock_slots();
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of artifact reads attempted so far
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    // Slots are only mutated by whole-value inserts/removes, so a poisoned
    // map is still consistent.
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::ArtifactSchema;
    use serde_json::json;
    use std::path::Path;

    fn write_forest(dir: &Path, model_id: &str, probability: f64) {
        let body = json!({
            "model_id": model_id,
            "family": "random_forest",
            "version": "1",
            "schema": ArtifactSchema::from(&FeatureSchema::v1()),
            "params": {"trees": [{"nodes": [{"fake_probability": probability}]}]}
        });
        std::fs::write(dir.join(format!("{model_id}.json")), body.to_string()).unwrap();
    }

    fn registry(dir: &Path) -> ModelRegistry {
        ModelRegistry::new(ModelLoader::new(dir), FeatureSchema::v1())
    }

    fn zeros() -> FeatureVector {
        FeatureVector {
            schema_version: 1,
            values: vec![0.0; 14],
        }
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        write_forest(dir.path(), "rf", 0.7);
        let registry = registry(dir.path());

        let a = registry.load("rf").unwrap();
        let b = registry.load("rf").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.load_count(), 1);
        assert_eq!(
            registry.predict_probability(&a, &zeros()).unwrap(),
            registry.predict_probability(&b, &zeros()).unwrap()
        );
        assert_eq!(registry.loaded_models(), vec!["rf".to_string()]);
    }

    #[test]
    fn test_cached_handle_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        write_forest(dir.path(), "rf", 0.7);
        let registry = registry(dir.path());

        registry.load("rf").unwrap();
        std::fs::remove_file(dir.path().join("rf.json")).unwrap();
        assert!(registry.load("rf").is_ok());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        assert!(registry.load("rf").is_err());
        assert!(registry.loaded_models().is_empty());

        write_forest(dir.path(), "rf", 0.2);
        assert!(registry.load("rf").is_ok());
        assert_eq!(registry.load_count(), 2);
    }

    #[test]
    fn test_shape_mismatch_at_call_time() {
        let dir = tempfile::tempdir().unwrap();
        write_forest(dir.path(), "rf", 0.7);
        let registry = registry(dir.path());
        let handle = registry.load("rf").unwrap();

        let short = FeatureVector {
            schema_version: 1,
            values: vec![0.0; 5],
        };
        let err = registry.predict_probability(&handle, &short).unwrap_err();
        assert_eq!(err.model_id, "rf");
        assert!(err.reason.contains("expected 14 features, got 5"));

        let wrong_version = FeatureVector {
            schema_version: 2,
            values: vec![0.0; 14],
        };
        assert!(registry.predict_probability(&handle, &wrong_version).is_err());
    }

    #[test]
    fn test_preload_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_forest(dir.path(), "rf", 0.7);
        let registry = registry(dir.path());

        let failures = registry.preload(&["rf", "svm"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].model_id, "svm");
    }
}
