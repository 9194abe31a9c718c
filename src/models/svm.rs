//! Support vector machine with Platt-scaled probabilities

use crate::models::artifact::ModelFamily;
use crate::models::classifier::{Classifier, Standardizer};
use anyhow::{bail, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear {
        weights: Vec<f64>,
    },
    Rbf {
        gamma: f64,
        support_vectors: Vec<Vec<f64>>,
        dual_coefs: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SvmParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub kernel: Kernel,
    pub bias: f64,
    /// Platt scaling: `p = 1 / (1 + exp(platt_a * f + platt_b))`
    pub platt_a: f64,
    pub platt_b: f64,
}

#[derive(Debug, Clone)]
pub struct Svm {
    scaler: Standardizer,
    kernel: Kernel,
    bias: f64,
    platt_a: f64,
    platt_b: f64,
    n_features: usize,
}

impl Svm {
    pub fn from_params(params: SvmParams, n_features: usize) -> Result<Self> {
        let scaler = Standardizer::new(params.mean, params.scale, n_features)?;

        match &params.kernel {
            Kernel::Linear { weights } => {
                if weights.len() != n_features {
                    bail!("linear kernel has {} weights, expected {}", weights.len(), n_features);
                }
            }
            Kernel::Rbf {
                gamma,
                support_vectors,
                dual_coefs,
            } => {
                if *gamma <= 0.0 || !gamma.is_finite() {
                    bail!("rbf gamma must be positive, got {}", gamma);
                }
                if support_vectors.is_empty() {
                    bail!("rbf kernel has no support vectors");
                }
                if support_vectors.len() != dual_coefs.len() {
                    bail!(
                        "{} support vectors but {} dual coefficients",
                        support_vectors.len(),
                        dual_coefs.len()
                    );
                }
                if let Some(i) = support_vectors.iter().position(|sv| sv.len() != n_features) {
                    bail!("support vector {} does not have {} features", i, n_features);
                }
            }
        }

        if !params.platt_a.is_finite() || !params.platt_b.is_finite() {
            bail!("platt coefficients must be finite");
        }

        Ok(Self {
            scaler,
            kernel: params.kernel,
            bias: params.bias,
            platt_a: params.platt_a,
            platt_b: params.platt_b,
            n_features,
        })
    }

    /// Signed distance to the separating hyperplane
    pub fn decision_function(&self, features: &[f32]) -> f64 {
        let x = self.scaler.transform(features);
        let raw = match &self.kernel {
            Kernel::Linear { weights } => weights.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>(),
            Kernel::Rbf {
                gamma,
                support_vectors,
                dual_coefs,
            } => support_vectors
                .iter()
                .zip(dual_coefs)
                .map(|(sv, coef)| {
                    let dist2: f64 = sv.iter().zip(&x).map(|(s, v)| (s - v).powi(2)).sum();
                    coef * (-gamma * dist2).exp()
                })
                .sum(),
        };
        raw + self.bias
    }
}

impl Classifier for Svm {
    fn family(&self) -> ModelFamily {
        ModelFamily::Svm
    }

    fn input_len(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f32]) -> Result<f64> {
        if features.len() != self.n_features {
            bail!("expected {} features, got {}", self.n_features, features.len());
        }
        let f = self.decision_function(features);
        Ok(1.0 / (1.0 + (self.platt_a * f + self.platt_b).exp()))
    }
}
