//! Feed-forward neural network (multi-layer perceptron)

use crate::models::artifact::ModelFamily;
use crate::models::classifier::{sigmoid, Classifier, Standardizer};
use anyhow::{bail, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Relu,
    Tanh,
    Sigmoid,
    /// Only valid on a two-unit output layer
    Softmax,
}

/// Fully connected layer: `out = activation(weights · in + bias)`
#[derive(Debug, Clone, Deserialize)]
pub struct DenseLayer {
    /// `weights[out][in]`
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    fn output_len(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let z: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();

        match self.activation {
            Activation::Identity => z,
            Activation::Relu => z.into_iter().map(|v| v.max(0.0)).collect(),
            Activation::Tanh => z.into_iter().map(f64::tanh).collect(),
            Activation::Sigmoid => z.into_iter().map(sigmoid).collect(),
            Activation::Softmax => {
                let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = z.iter().map(|v| (v - max).exp()).collect();
                let total: f64 = exps.iter().sum();
                exps.into_iter().map(|e| e / total).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeuralNetworkParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub layers: Vec<DenseLayer>,
}

#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    scaler: Standardizer,
    layers: Vec<DenseLayer>,
    n_features: usize,
}

impl NeuralNetwork {
    pub fn from_params(params: NeuralNetworkParams, n_features: usize) -> Result<Self> {
        let scaler = Standardizer::new(params.mean, params.scale, n_features)?;

        if params.layers.is_empty() {
            bail!("network has no layers");
        }

        let mut fan_in = n_features;
        let last = params.layers.len() - 1;
        for (i, layer) in params.layers.iter().enumerate() {
            if layer.weights.len() != layer.output_len() {
                bail!(
                    "layer {} has {} weight rows but {} biases",
                    i,
                    layer.weights.len(),
                    layer.output_len()
                );
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != fan_in) {
                bail!("layer {} weight row {} does not have {} inputs", i, row, fan_in);
            }
            if layer.activation == Activation::Softmax && i != last {
                bail!("softmax is only allowed on the output layer");
            }
            fan_in = layer.output_len();
        }

        let output = &params.layers[last];
        match (output.activation, output.output_len()) {
            (Activation::Sigmoid, 1) | (Activation::Softmax, 2) => {}
            (activation, units) => bail!(
                "output layer must be 1 sigmoid unit or 2 softmax units, got {} {:?} units",
                units,
                activation
            ),
        }

        Ok(Self {
            scaler,
            layers: params.layers,
            n_features,
        })
    }
}

impl Classifier for NeuralNetwork {
    fn family(&self) -> ModelFamily {
        ModelFamily::NeuralNetwork
    }

    fn input_len(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f32]) -> Result<f64> {
        if features.len() != self.n_features {
            bail!("expected {} features, got {}", self.n_features, features.len());
        }

        let output = self
            .layers
            .iter()
            .fold(self.scaler.transform(features), |x, layer| layer.forward(&x));

        // sigmoid output has one unit, softmax puts the fake class at index 1
        Ok(*output.last().unwrap_or(&0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(layers: serde_json::Value, n_features: usize) -> Result<NeuralNetwork> {
        let params: NeuralNetworkParams = serde_json::from_value(json!({
            "mean": vec![0.0; n_features],
            "scale": vec![1.0; n_features],
            "layers": layers
        }))?;
        NeuralNetwork::from_params(params, n_features)
    }

    #[test]
    fn test_sigmoid_output() {
        let nn = build(
            json!([
                {"weights": [[1.0, 0.0], [0.0, 1.0]], "bias": [0.0, 0.0], "activation": "relu"},
                {"weights": [[1.0, 1.0]], "bias": [-1.0], "activation": "sigmoid"}
            ]),
            2,
        )
        .unwrap();

        // relu(-3) = 0, relu(1) = 1, then 0 + 1 - 1 = 0
        assert!((nn.predict_proba(&[-3.0, 1.0]).unwrap() - 0.5).abs() < 1e-12);
        assert!(nn.predict_proba(&[4.0, 4.0]).unwrap() > 0.99);
    }

    #[test]
    fn test_softmax_output() {
        let nn = build(
            json!([
                {"weights": [[0.0], [1.0]], "bias": [0.0, 0.0], "activation": "softmax"}
            ]),
            1,
        )
        .unwrap();

        let p = nn.predict_proba(&[2.0]).unwrap();
        let expected = 2.0f64.exp() / (1.0 + 2.0f64.exp());
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_topology() {
        // output layer with 3 units
        assert!(build(
            json!([{"weights": [[1.0], [1.0], [1.0]], "bias": [0.0, 0.0, 0.0], "activation": "softmax"}]),
            1
        )
        .is_err());

        // hidden layer fan-in mismatch
        assert!(build(
            json!([
                {"weights": [[1.0, 1.0, 1.0]], "bias": [0.0], "activation": "tanh"},
                {"weights": [[1.0]], "bias": [0.0], "activation": "sigmoid"}
            ]),
            2
        )
        .is_err());

        // identity output is not a probability
        assert!(build(
            json!([{"weights": [[1.0]], "bias": [0.0], "activation": "identity"}]),
            1
        )
        .is_err());

        assert!(build(json!([]), 1).is_err());
    }
}
