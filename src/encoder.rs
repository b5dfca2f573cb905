//! The LabelEncoder maps class labels to small integer codes
//! and back.  It is a Vec of labels; a label's code is its
//! position in the Vec.
//!
//! Models that natively emit integers (boosted tree ensembles)
//! carry one of these so their output can be turned back into
//! the labels they were trained on.

use crate::error::{Error, LoadError, Result};
use bincode::{Decode, Encode};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Codes are assigned in the order the labels are given.
    pub fn new<S: Into<String>>(classes: impl IntoIterator<Item = S>) -> LabelEncoder {
        LabelEncoder {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Sorted, deduplicated labels, the way an encoder fit on
    /// raw training labels assigns codes.
    pub fn fit<S: AsRef<str>>(labels: impl IntoIterator<Item = S>) -> LabelEncoder {
        let mut classes: Vec<String> = labels.into_iter().map(|s| s.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        LabelEncoder { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn transform(&self, label: &str) -> Option<u32> {
        self.classes
            .iter()
            .position(|c| c == label)
            .map(|i| i as u32)
    }

    pub fn inverse_transform(&self, code: u32) -> Result<&str> {
        self.classes
            .get(code as usize)
            .map(String::as_str)
            .ok_or(Error::Decode { code })
    }

    /// Decode a whole batch; the first unknown code fails the batch.
    pub fn inverse_transform_all(&self, codes: &[u32]) -> Result<Vec<String>> {
        codes
            .iter()
            .map(|&code| self.inverse_transform(code).map(str::to_string))
            .collect()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), LoadError> {
        if self.classes.is_empty() {
            return Err(LoadError::schema("label encoder has no classes"));
        }
        let mut seen = HashSet::new();
        for c in &self.classes {
            if !seen.insert(c.as_str()) {
                return Err(LoadError::schema(format!(
                    "label encoder lists {:?} twice",
                    c
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_sorts_and_dedups() {
        let enc = LabelEncoder::fit(["P3", "P1", "P3", "P2", "P4", "P1"]);
        assert_eq!(enc.classes(), &["P1", "P2", "P3", "P4"]);
        assert_eq!(enc.transform("P3"), Some(2));
        assert_eq!(enc.transform("P9"), None);
    }

    #[test]
    fn inverse_of_known_code() {
        let enc = LabelEncoder::new(["P1", "P2"]);
        assert_eq!(enc.inverse_transform(0).unwrap(), "P1");
        assert_eq!(
            enc.inverse_transform_all(&[1, 0, 1]).unwrap(),
            vec!["P2", "P1", "P2"]
        );
    }

    #[test]
    fn unknown_code_is_a_decode_error() {
        let enc = LabelEncoder::new(["P1", "P2"]);
        match enc.inverse_transform_all(&[0, 7]) {
            Err(Error::Decode { code }) => assert_eq!(code, 7),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_labels_fail_validation() {
        assert!(LabelEncoder::new(["P1", "P1"]).validate().is_err());
        assert!(LabelEncoder::new(Vec::<String>::new()).validate().is_err());
        assert!(LabelEncoder::new(["P1", "P2"]).validate().is_ok());
    }
}
