use crate::bundle::ModelBundle;
use crate::error::{Error, LoadError, Result};
use crate::frame::{FeatureMatrix, Frame};
use crate::model::{argmax, ProbabilisticModel};
use log::debug;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Column order of the probability vectors `predict` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityOrder {
    /// The classifier's own class index order.
    #[default]
    Model,
    /// The bundle's `class_names` order.
    ClassNames,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictOptions {
    pub parallel_threshold: usize,
    pub probability_order: ProbabilityOrder,
}

impl Default for PredictOptions {
    fn default() -> PredictOptions {
        PredictOptions {
            parallel_threshold: 1024,
            probability_order: ProbabilityOrder::Model,
        }
    }
}

/// Parallel per-row results: `labels[i]` and `probabilities[i]`
/// belong to input row `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Predictions {
    pub labels: Vec<String>,
    pub probabilities: Vec<Vec<f64>>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.probabilities.iter().map(Vec::as_slice))
    }
}

/// Scores rows against a loaded bundle.  Holds no mutable state, so
/// one predictor can be shared between threads.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ModelBundle,
    options: PredictOptions,
    /// `permutation[j]` is the model class shown in output column `j`.
    permutation: Option<Vec<usize>>,
}

impl Predictor {
    pub fn new(bundle: ModelBundle) -> Predictor {
        Predictor {
            bundle,
            options: PredictOptions::default(),
            permutation: None,
        }
    }

    /// Aligning probabilities to `class_names` needs the classifier's
    /// decoded labels to be a permutation of them.
    pub fn with_options(bundle: ModelBundle, options: PredictOptions) -> Result<Predictor> {
        let permutation = match options.probability_order {
            ProbabilityOrder::Model => None,
            ProbabilityOrder::ClassNames => Some(class_name_permutation(&bundle)?),
        };
        Ok(Predictor {
            bundle,
            options,
            permutation,
        })
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn options(&self) -> &PredictOptions {
        &self.options
    }

    pub fn feature_names(&self) -> &[String] {
        self.bundle.feature_names()
    }

    /// Label of each probability column, in output order.
    pub fn probability_labels(&self) -> Result<Vec<String>> {
        match self.permutation {
            Some(_) => Ok(self.bundle.class_names().to_vec()),
            None => self.bundle.classifier().labels(),
        }
    }

    /// Labels and class probabilities for every row.
    ///
    /// Columns are picked out by name, so their order in `rows` does
    /// not matter and extra columns are ignored.
    pub fn predict(&self, rows: &Frame) -> Result<Predictions> {
        let matrix = rows.select(self.bundle.feature_names())?;
        self.predict_matrix(&matrix)
    }

    /// Same as `predict`, for rows already in feature order.
    pub fn predict_matrix(&self, matrix: &FeatureMatrix) -> Result<Predictions> {
        let n_features = self.bundle.feature_names().len();
        if matrix.n_cols() != n_features {
            return Err(Error::Shape {
                expected: n_features,
                found: matrix.n_cols(),
            });
        }
        if !self.bundle.model().accepts_missing() {
            check_finite(matrix)?;
        }

        let n = matrix.n_rows();
        let parallel = n >= self.options.parallel_threshold;
        debug!(
            "scoring {} rows with {} model ({})",
            n,
            self.bundle.model().kind(),
            if parallel { "parallel" } else { "serial" }
        );

        let scored: Vec<(String, Vec<f64>)> = if parallel {
            (0..n)
                .into_par_iter()
                .map(|i| self.score_row(i, matrix.row(i)))
                .collect::<Result<_>>()?
        } else {
            (0..n)
                .map(|i| self.score_row(i, matrix.row(i)))
                .collect::<Result<_>>()?
        };

        let (labels, probabilities): (Vec<String>, Vec<Vec<f64>>) = scored.into_iter().unzip();
        Ok(Predictions {
            labels,
            probabilities,
        })
    }

    /// Convenience for a single JSON record.
    pub fn predict_one(&self, record: Map<String, JsonValue>) -> Result<(String, Vec<f64>)> {
        let frame = Frame::from_records([record]);
        let mut predictions = self.predict(&frame)?;
        match (predictions.labels.pop(), predictions.probabilities.pop()) {
            (Some(label), Some(proba)) => Ok((label, proba)),
            _ => Err(Error::Shape {
                expected: 1,
                found: 0,
            }),
        }
    }

    fn score_row(&self, row: usize, x: &[f64]) -> Result<(String, Vec<f64>)> {
        let classifier = self.bundle.classifier();
        let proba = classifier.model().predict_proba_row(x);
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(Error::NonFinite { row });
        }
        let raw = classifier.raw_label(argmax(&proba));
        let label = classifier.decode(raw)?.to_string();
        let proba = match &self.permutation {
            Some(perm) => perm.iter().map(|&k| proba[k]).collect(),
            None => proba,
        };
        Ok((label, proba))
    }
}

/// Missing and infinite cells, for models that cannot route them.
fn check_finite(matrix: &FeatureMatrix) -> Result<()> {
    for i in 0..matrix.n_rows() {
        if let Some((c, v)) = matrix
            .row(i)
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(Error::InvalidValue {
                row: i,
                column: matrix.columns()[c].clone(),
                value: if v.is_nan() {
                    "missing".to_string()
                } else {
                    v.to_string()
                },
            });
        }
    }
    Ok(())
}

fn class_name_permutation(bundle: &ModelBundle) -> Result<Vec<usize>> {
    let labels = bundle.classifier().labels().map_err(|e| {
        LoadError::schema(format!("cannot align probabilities to class_names: {}", e))
    })?;
    bundle
        .class_names()
        .iter()
        .map(|name| {
            labels.iter().position(|l| l == name).ok_or_else(|| {
                Error::from(LoadError::schema(format!(
                    "class name {:?} is not a class of the model ({:?})",
                    name, labels
                )))
            })
        })
        .collect()
}
