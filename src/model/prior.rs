use super::ProbabilisticModel;
use crate::error::LoadError;
use bincode::{Decode, Encode};
use serde_derive::{Deserialize, Serialize};

/// Ignores its input and always answers with the class distribution
/// seen in training.  Useful as a baseline.
#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct PriorModel {
    pub priors: Vec<f64>,
}

impl PriorModel {
    pub fn new(priors: Vec<f64>) -> PriorModel {
        PriorModel { priors }
    }

    /// Puts all the mass on one class.
    pub fn constant(n_classes: usize, class: usize) -> PriorModel {
        let mut priors = vec![0.0; n_classes];
        priors[class] = 1.0;
        PriorModel { priors }
    }

    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        if self.priors.is_empty() {
            return Err(LoadError::schema("prior model has no classes"));
        }
        if self.priors.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(LoadError::schema("prior probabilities must be non-negative"));
        }
        let total: f64 = self.priors.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(LoadError::schema(format!(
                "prior probabilities sum to {}, not 1",
                total
            )));
        }
        Ok(())
    }
}

impl ProbabilisticModel for PriorModel {
    fn n_classes(&self) -> usize {
        self.priors.len()
    }

    fn n_features(&self) -> Option<usize> {
        None
    }

    fn accepts_missing(&self) -> bool {
        true
    }

    fn predict_proba_row(&self, _row: &[f64]) -> Vec<f64> {
        self.priors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_model_always_picks_its_class() {
        let model = PriorModel::constant(4, 0);
        assert_eq!(model.predict_proba_row(&[30.0, 50000.0]), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(model.predict_row(&[]), 0);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn priors_must_be_a_distribution() {
        assert!(PriorModel::new(vec![0.5, 0.4]).validate().is_err());
        assert!(PriorModel::new(vec![1.5, -0.5]).validate().is_err());
        assert!(PriorModel::new(vec![]).validate().is_err());
    }
}
