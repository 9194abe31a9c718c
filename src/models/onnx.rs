//! ONNX Runtime backed classifier
//!
//! Handles both tensor outputs (sklearn random forest / SVC / MLP exports)
//! and `seq(map(int64, float))` outputs (ZipMap) for the class-1 probability.

use crate::models::artifact::ModelFamily;
use crate::models::classifier::Classifier;
use anyhow::{anyhow, Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing::{debug, info, warn};

static ORT_INIT: Once = Once::new();

#[derive(Debug, Clone, Deserialize)]
pub struct OnnxParams {
    /// Path to the `.onnx` file, relative to the artifact's directory
    pub path: String,
}

/// A loaded ONNX session with resolved input/output names
pub struct OnnxClassifier {
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    n_features: usize,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("n_features", &self.n_features)
            .finish()
    }
}

impl OnnxClassifier {
    pub fn load(
        params: OnnxParams,
        artifact_dir: &Path,
        n_features: usize,
        threads: usize,
    ) -> Result<Self> {
        ORT_INIT.call_once(|| {
            if let Err(e) = ort::init().commit() {
                warn!(error = %e, "ONNX Runtime environment init failed");
            } else {
                info!("ONNX Runtime initialized");
            }
        });

        let path = artifact_dir.join(&params.path);
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(&path)
            .with_context(|| format!("Failed to load ONNX model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        debug!(input = %input_name, output = %output_name, "ONNX session ready");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            n_features,
        })
    }

    fn extract_probability(&self, outputs: &SessionOutputs) -> Result<f64> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(p) = Self::probability_from_value(&output)? {
                return Ok(p);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(p) = Self::probability_from_value(&output)? {
                return Ok(p);
            }
        }

        Err(anyhow!("no probability output found"))
    }

    fn probability_from_value(output: &DynValue) -> Result<Option<f64>> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let classes = dims.last().copied().unwrap_or(0);
            let p = match classes {
                c if c >= 2 => data.get(1),
                1 => data.first(),
                _ => data.last(),
            };
            return Ok(p.map(|&v| v as f64));
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            let allocator = Allocator::default();
            let sequence = output
                .downcast_ref::<DynSequenceValueType>()
                .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;
            let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
            let Some(first) = maps.first() else {
                return Ok(None);
            };
            let pairs = first.try_extract_key_values::<i64, f32>()?;
            if let Some((_, p)) = pairs.iter().find(|(class, _)| *class == 1) {
                return Ok(Some(*p as f64));
            }
            if let Some((_, p)) = pairs.iter().find(|(class, _)| *class == 0) {
                return Ok(Some(1.0 - *p as f64));
            }
        }

        Ok(None)
    }
}

impl Classifier for OnnxClassifier {
    fn family(&self) -> ModelFamily {
        ModelFamily::Onnx
    }

    fn input_len(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f32]) -> Result<f64> {
        let shape = vec![1_i64, features.len() as i64];
        let input = Tensor::from_array((shape, features.to_vec()))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;

        self.extract_probability(&outputs)
    }
}
