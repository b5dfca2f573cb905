//! Gradient-boosted tree ensembles.
//!
//! Trees are stored structure-of-arrays: node `i` of a tree is the
//! `i`th entry of every Vec.  Each tree adds its leaf value to the
//! margin of one output group.  One group is a binary model (sigmoid
//! over the margin); several groups are a multiclass model (softmax
//! over the group margins).

use super::transform::{binary_probabilities, softmax_inplace};
use super::ProbabilisticModel;
use crate::error::LoadError;
use bincode::{Decode, Encode};
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct Tree {
    pub split_feature: Vec<u32>,
    pub threshold: Vec<f64>,
    pub left: Vec<u32>,
    pub right: Vec<u32>,
    /// Direction taken when the split feature is missing (NaN).
    pub default_left: Vec<bool>,
    pub is_leaf: Vec<bool>,
    pub leaf_value: Vec<f64>,
}

impl Tree {
    pub fn leaf(value: f64) -> Tree {
        Tree {
            split_feature: vec![0],
            threshold: vec![0.0],
            left: vec![0],
            right: vec![0],
            default_left: vec![false],
            is_leaf: vec![true],
            leaf_value: vec![value],
        }
    }

    /// One split with two leaves: `x[feature] < threshold` goes left.
    pub fn stump(
        feature: u32,
        threshold: f64,
        left_value: f64,
        right_value: f64,
        default_left: bool,
    ) -> Tree {
        Tree {
            split_feature: vec![feature, 0, 0],
            threshold: vec![threshold, 0.0, 0.0],
            left: vec![1, 0, 0],
            right: vec![2, 0, 0],
            default_left: vec![default_left, false, false],
            is_leaf: vec![false, true, true],
            leaf_value: vec![0.0, left_value, right_value],
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn traverse_to_leaf(&self, x: &[f64]) -> usize {
        let mut node = 0;
        while !self.is_leaf[node] {
            let fvalue = x[self.split_feature[node] as usize];
            node = if fvalue.is_nan() {
                if self.default_left[node] {
                    self.left[node] as usize
                } else {
                    self.right[node] as usize
                }
            } else if fvalue < self.threshold[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        node
    }

    pub fn predict_row(&self, x: &[f64]) -> f64 {
        self.leaf_value[self.traverse_to_leaf(x)]
    }

    /// Children must point strictly forward, which rules out cycles
    /// and guarantees traversal terminates.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.n_nodes();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        for (name, len) in [
            ("split_feature", self.split_feature.len()),
            ("threshold", self.threshold.len()),
            ("left", self.left.len()),
            ("right", self.right.len()),
            ("default_left", self.default_left.len()),
            ("leaf_value", self.leaf_value.len()),
        ] {
            if len != n {
                return Err(format!("{} has {} entries for {} nodes", name, len, n));
            }
        }
        for node in 0..n {
            if self.is_leaf[node] {
                if !self.leaf_value[node].is_finite() {
                    return Err(format!("leaf {} has a non-finite value", node));
                }
                continue;
            }
            for (side, child) in [("left", self.left[node]), ("right", self.right[node])] {
                let child = child as usize;
                if child <= node || child >= n {
                    return Err(format!(
                        "node {} has {} child {} (must be in {}..{})",
                        node,
                        side,
                        child,
                        node + 1,
                        n
                    ));
                }
            }
            if self.split_feature[node] as usize >= n_features {
                return Err(format!(
                    "node {} splits on feature {} of {}",
                    node, self.split_feature[node], n_features
                ));
            }
            if self.threshold[node].is_nan() {
                return Err(format!("node {} has a NaN threshold", node));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct Forest {
    pub n_features: usize,
    pub n_groups: usize,
    pub base_score: Vec<f64>,
    pub trees: Vec<Tree>,
    /// Output group of each tree.
    pub tree_group: Vec<u32>,
}

impl Forest {
    pub fn new(n_features: usize, n_groups: usize) -> Forest {
        Forest {
            n_features,
            n_groups,
            base_score: vec![0.0; n_groups],
            trees: Vec::new(),
            tree_group: Vec::new(),
        }
    }

    pub fn with_base_score(mut self, base_score: Vec<f64>) -> Forest {
        self.base_score = base_score;
        self
    }

    pub fn push_tree(&mut self, tree: Tree, group: u32) {
        self.trees.push(tree);
        self.tree_group.push(group);
    }

    /// Raw per-group margins.
    pub fn margins(&self, x: &[f64]) -> Vec<f64> {
        let mut margins = self.base_score.clone();
        for (tree, &group) in self.trees.iter().zip(&self.tree_group) {
            margins[group as usize] += tree.predict_row(x);
        }
        margins
    }

    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        if self.n_groups == 0 {
            return Err(LoadError::schema("forest has no output groups"));
        }
        if self.base_score.len() != self.n_groups {
            return Err(LoadError::schema(format!(
                "forest has {} base scores for {} groups",
                self.base_score.len(),
                self.n_groups
            )));
        }
        if self.tree_group.len() != self.trees.len() {
            return Err(LoadError::schema(format!(
                "forest has {} trees but {} group assignments",
                self.trees.len(),
                self.tree_group.len()
            )));
        }
        if let Some(g) = self.tree_group.iter().find(|&&g| g as usize >= self.n_groups) {
            return Err(LoadError::schema(format!(
                "tree assigned to group {} of {}",
                g, self.n_groups
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| LoadError::schema(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }
}

impl ProbabilisticModel for Forest {
    fn n_classes(&self) -> usize {
        match self.n_groups {
            1 => 2,
            n => n,
        }
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn accepts_missing(&self) -> bool {
        true
    }

    fn predict_proba_row(&self, row: &[f64]) -> Vec<f64> {
        let mut margins = self.margins(row);
        if self.n_groups == 1 {
            return binary_probabilities(margins[0]);
        }
        softmax_inplace(&mut margins);
        margins
    }
}
