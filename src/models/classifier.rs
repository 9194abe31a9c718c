//! Uniform classifier capability shared by every model family

use crate::models::artifact::ModelFamily;
use anyhow::Result;

/// A trained binary classifier.
///
/// Implementations return the probability of the positive (fake) class for a
/// single feature row whose length equals [`Classifier::input_len`].
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn family(&self) -> ModelFamily;

    /// Number of features the model consumes
    fn input_len(&self) -> usize;

    fn predict_proba(&self, features: &[f32]) -> Result<f64>;
}

/// Standardisation `(x - mean) / scale` applied before SVM and MLP models
#[derive(Debug, Clone)]
pub(crate) struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    pub(crate) fn new(mean: Vec<f64>, scale: Vec<f64>, n_features: usize) -> Result<Self> {
        if mean.len() != n_features || scale.len() != n_features {
            anyhow::bail!(
                "scaler has {} means and {} scales, expected {}",
                mean.len(),
                scale.len(),
                n_features
            );
        }
        if let Some(i) = scale.iter().position(|&s| s == 0.0 || !s.is_finite()) {
            anyhow::bail!("scaler scale for feature {} is zero or not finite", i);
        }
        Ok(Self { mean, scale })
    }

    pub(crate) fn transform(&self, features: &[f32]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (m, s))| (x as f64 - m) / s)
            .collect()
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizer() {
        let s = Standardizer::new(vec![1.0, 10.0], vec![2.0, 5.0], 2).unwrap();
        assert_eq!(s.transform(&[3.0, 0.0]), vec![1.0, -2.0]);
    }

    #[test]
    fn test_standardizer_rejects_bad_shapes() {
        assert!(Standardizer::new(vec![0.0], vec![1.0, 1.0], 2).is_err());
        assert!(Standardizer::new(vec![0.0, 0.0], vec![1.0, 0.0], 2).is_err());
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
