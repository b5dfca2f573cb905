use super::transform::{binary_probabilities, softmax_inplace};
use super::ProbabilisticModel;
use crate::error::LoadError;
use bincode::{Decode, Encode};
use serde_derive::{Deserialize, Serialize};

/// Logistic regression.  One weight row means a binary model
/// (the row scores the second class); more rows are a multinomial
/// model with one row per class.
///
/// `w` is row-major, `n_outputs x n_features`.
#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct LinearModel {
    pub n_features: usize,
    pub w: Vec<f64>,
    pub intercept: Vec<f64>,
}

impl LinearModel {
    pub fn new(n_features: usize, w: Vec<f64>, intercept: Vec<f64>) -> LinearModel {
        LinearModel {
            n_features,
            w,
            intercept,
        }
    }

    pub fn n_outputs(&self) -> usize {
        self.intercept.len()
    }

    fn weights(&self, output: usize) -> &[f64] {
        let start = output * self.n_features;
        &self.w[start..start + self.n_features]
    }

    pub fn inner_product(&self, output: usize, x: &[f64]) -> f64 {
        let mut prod = self.intercept[output];
        for (wt, v) in self.weights(output).iter().zip(x) {
            prod += wt * v;
        }
        prod
    }

    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        if self.intercept.is_empty() {
            return Err(LoadError::schema("linear model has no outputs"));
        }
        let expected = self.n_outputs() * self.n_features;
        if self.w.len() != expected {
            return Err(LoadError::schema(format!(
                "linear model has {} weights, expected {} ({} outputs x {} features)",
                self.w.len(),
                expected,
                self.n_outputs(),
                self.n_features
            )));
        }
        if self.w.iter().chain(&self.intercept).any(|v| !v.is_finite()) {
            return Err(LoadError::schema("linear model has non-finite weights"));
        }
        Ok(())
    }
}

impl ProbabilisticModel for LinearModel {
    fn n_classes(&self) -> usize {
        match self.n_outputs() {
            1 => 2,
            n => n,
        }
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn accepts_missing(&self) -> bool {
        false
    }

    fn predict_proba_row(&self, row: &[f64]) -> Vec<f64> {
        if self.n_outputs() == 1 {
            return binary_probabilities(self.inner_product(0, row));
        }
        let mut margins: Vec<f64> = (0..self.n_outputs())
            .map(|k| self.inner_product(k, row))
            .collect();
        softmax_inplace(&mut margins);
        margins
    }
}
