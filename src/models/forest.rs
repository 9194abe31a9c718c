//! Random forest classifier

use crate::models::artifact::ModelFamily;
use crate::models::classifier::Classifier;
use anyhow::{bail, Result};
use serde::Deserialize;

/// One node of a decision tree; node 0 is the root.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// `x[feature] <= threshold` goes to `left`, otherwise `right`
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf { fake_probability: f64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForestParams {
    pub trees: Vec<DecisionTree>,
}

/// Averages the leaf probabilities of its trees
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn from_params(params: RandomForestParams, n_features: usize) -> Result<Self> {
        if params.trees.is_empty() {
            bail!("random forest has no trees");
        }

        for (t, tree) in params.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                bail!("tree {} has no nodes", t);
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match *node {
                    TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if feature >= n_features {
                            bail!("tree {} node {} splits on feature {} of {}", t, i, feature, n_features);
                        }
                        if !threshold.is_finite() {
                            bail!("tree {} node {} has a non-finite threshold", t, i);
                        }
                        // children after parents rules out cycles
                        for child in [left, right] {
                            if child <= i || child >= tree.nodes.len() {
                                bail!("tree {} node {} has invalid child index {}", t, i, child);
                            }
                        }
                    }
                    TreeNode::Leaf { fake_probability } => {
                        if !(0.0..=1.0).contains(&fake_probability) {
                            bail!("tree {} leaf {} probability {} outside [0, 1]", t, i, fake_probability);
                        }
                    }
                }
            }
        }

        Ok(Self {
            trees: params.trees,
            n_features,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn eval_tree(tree: &DecisionTree, features: &[f32]) -> f64 {
        let mut index = 0;
        loop {
            match tree.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[feature] <= threshold { left } else { right };
                }
                TreeNode::Leaf { fake_probability } => return fake_probability,
            }
        }
    }
}

impl Classifier for RandomForest {
    fn family(&self) -> ModelFamily {
        ModelFamily::RandomForest
    }

    fn input_len(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f32]) -> Result<f64> {
        if features.len() != self.n_features {
            bail!("expected {} features, got {}", self.n_features, features.len());
        }

        let sum: f64 = self
            .trees
            .iter()
            .map(|tree| Self::eval_tree(tree, features))
            .sum();

        Ok(sum / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stump(feature: usize, threshold: f32, low: f64, high: f64) -> serde_json::Value {
        json!({
            "nodes": [
                {"feature": feature, "threshold": threshold, "left": 1, "right": 2},
                {"fake_probability": low},
                {"fake_probability": high}
            ]
        })
    }

    fn forest(trees: Vec<serde_json::Value>, n_features: usize) -> Result<RandomForest> {
        let params: RandomForestParams = serde_json::from_value(json!({ "trees": trees }))?;
        RandomForest::from_params(params, n_features)
    }

    #[test]
    fn test_averages_tree_votes() {
        let rf = forest(vec![stump(0, 1.0, 0.2, 0.9), stump(1, 0.5, 0.0, 0.6)], 2).unwrap();

        // left in tree 0 (0.2), right in tree 1 (0.6)
        let p = rf.predict_proba(&[1.0, 3.0]).unwrap();
        assert!((p - 0.4).abs() < 1e-12);

        // right in both
        let p = rf.predict_proba(&[5.0, 3.0]).unwrap();
        assert!((p - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_leaf_tree() {
        let rf = forest(vec![json!({"nodes": [{"fake_probability": 0.3}]})], 4).unwrap();
        assert_eq!(rf.predict_proba(&[0.0; 4]).unwrap(), 0.3);
        assert_eq!(rf.tree_count(), 1);
    }

    #[test]
    fn test_rejects_malformed_trees() {
        assert!(forest(vec![], 2).is_err());
        assert!(forest(vec![stump(5, 1.0, 0.1, 0.2)], 2).is_err());
        assert!(forest(vec![stump(0, 1.0, 0.1, 1.5)], 2).is_err());

        let cyclic = json!({
            "nodes": [
                {"feature": 0, "threshold": 1.0, "left": 0, "right": 1},
                {"fake_probability": 0.5}
            ]
        });
        assert!(forest(vec![cyclic], 2).is_err());
    }

    #[test]
    fn test_rejects_wrong_input_length() {
        let rf = forest(vec![stump(0, 1.0, 0.2, 0.9)], 2).unwrap();
        assert!(rf.predict_proba(&[1.0]).is_err());
    }
}
