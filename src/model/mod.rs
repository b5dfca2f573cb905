//! Classifier families that can live inside a model bundle.

pub mod forest;
pub mod linear;
pub mod prior;
pub mod transform;

pub use forest::{Forest, Tree};
pub use linear::LinearModel;
pub use prior::PriorModel;

use crate::error::LoadError;
use bincode::{Decode, Encode};
use ordered_float::OrderedFloat;
use serde_derive::{Deserialize, Serialize};

/// A trained model that scores one feature row at a time.
///
/// Rows arrive already in the model's feature order.  Missing
/// values are NaN.
pub trait ProbabilisticModel {
    fn n_classes(&self) -> usize;

    /// `None` for models that ignore their input.
    fn n_features(&self) -> Option<usize>;

    /// Whether NaN inputs mean something to this model.
    fn accepts_missing(&self) -> bool;

    /// One probability per class, in class index order.
    fn predict_proba_row(&self, row: &[f64]) -> Vec<f64>;

    /// Index of the most probable class.
    fn predict_row(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba_row(row))
    }
}

/// First index of the largest value; ties go to the lower index.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if OrderedFloat(*v) > OrderedFloat(values[best]) {
            best = i;
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Model {
    Linear(LinearModel),
    Forest(Forest),
    Prior(PriorModel),
}

impl Model {
    pub fn kind(&self) -> &'static str {
        match self {
            Model::Linear(_) => "linear",
            Model::Forest(_) => "forest",
            Model::Prior(_) => "prior",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        match self {
            Model::Linear(m) => m.validate(),
            Model::Forest(m) => m.validate(),
            Model::Prior(m) => m.validate(),
        }
    }

    fn inner(&self) -> &dyn ProbabilisticModel {
        match self {
            Model::Linear(m) => m,
            Model::Forest(m) => m,
            Model::Prior(m) => m,
        }
    }
}

impl ProbabilisticModel for Model {
    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }

    fn accepts_missing(&self) -> bool {
        self.inner().accepts_missing()
    }

    fn predict_proba_row(&self, row: &[f64]) -> Vec<f64> {
        self.inner().predict_proba_row(row)
    }
}
