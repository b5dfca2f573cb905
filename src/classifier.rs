use crate::encoder::LabelEncoder;
use crate::error::{Error, LoadError, Result};
use crate::model::{Model, ProbabilisticModel};
use bincode::{Decode, Encode};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;

/// A model whose classes are label strings.
#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct DirectLabelClassifier {
    pub model: Model,
    /// Label of each class index.
    pub classes: Vec<String>,
}

/// A model whose classes are integer codes that have to go
/// through a label encoder to become labels.
#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct EncodedLabelClassifier {
    pub model: Model,
    /// Raw code emitted for each class index.
    pub codes: Vec<u32>,
    pub label_encoder: LabelEncoder,
}

impl EncodedLabelClassifier {
    /// Class `i` emits code `i`, as boosted models trained on
    /// encoded labels do.
    pub fn new(model: Model, label_encoder: LabelEncoder) -> EncodedLabelClassifier {
        let codes = (0..model.n_classes() as u32).collect();
        EncodedLabelClassifier {
            model,
            codes,
            label_encoder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
#[serde(tag = "labels", rename_all = "snake_case")]
pub enum Classifier {
    Direct(DirectLabelClassifier),
    Encoded(EncodedLabelClassifier),
}

impl Classifier {
    pub fn direct<S: Into<String>>(
        model: Model,
        classes: impl IntoIterator<Item = S>,
    ) -> Classifier {
        Classifier::Direct(DirectLabelClassifier {
            model,
            classes: classes.into_iter().map(Into::into).collect(),
        })
    }

    pub fn encoded(model: Model, label_encoder: LabelEncoder) -> Classifier {
        Classifier::Encoded(EncodedLabelClassifier::new(model, label_encoder))
    }

    pub fn model(&self) -> &Model {
        match self {
            Classifier::Direct(c) => &c.model,
            Classifier::Encoded(c) => &c.model,
        }
    }

    pub fn label_encoder(&self) -> Option<&LabelEncoder> {
        match self {
            Classifier::Direct(_) => None,
            Classifier::Encoded(c) => Some(&c.label_encoder),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.model().n_classes()
    }

    /// Raw label for a class index: a label string, or a code.
    pub fn raw_label(&self, class: usize) -> RawLabel<'_> {
        match self {
            Classifier::Direct(c) => RawLabel::Text(&c.classes[class]),
            Classifier::Encoded(c) => RawLabel::Code(c.codes[class]),
        }
    }

    /// Turn a raw label into its final string. Codes need the label
    /// encoder, so a code on a direct classifier does not decode.
    pub fn decode<'a>(&'a self, raw: RawLabel<'a>) -> Result<&'a str> {
        match (self, raw) {
            (_, RawLabel::Text(label)) => Ok(label),
            (Classifier::Encoded(c), RawLabel::Code(code)) => {
                c.label_encoder.inverse_transform(code)
            }
            (Classifier::Direct(_), RawLabel::Code(code)) => Err(Error::Decode { code }),
        }
    }

    /// The label a class index ends up as after decoding.
    pub fn label(&self, class: usize) -> Result<&str> {
        self.decode(self.raw_label(class))
    }

    /// Decoded label of every class index, in index order.
    pub fn labels(&self) -> Result<Vec<String>> {
        (0..self.n_classes())
            .map(|i| self.label(i).map(str::to_string))
            .collect()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), LoadError> {
        self.model().validate()?;
        let n_classes = self.n_classes();
        match self {
            Classifier::Direct(c) => {
                if c.classes.len() != n_classes {
                    return Err(LoadError::schema(format!(
                        "classifier has {} labels for {} classes",
                        c.classes.len(),
                        n_classes
                    )));
                }
                let mut seen = HashSet::new();
                if let Some(dup) = c.classes.iter().find(|l| !seen.insert(l.as_str())) {
                    return Err(LoadError::schema(format!(
                        "classifier lists label {:?} twice",
                        dup
                    )));
                }
            }
            Classifier::Encoded(c) => {
                if c.codes.len() != n_classes {
                    return Err(LoadError::schema(format!(
                        "classifier has {} codes for {} classes",
                        c.codes.len(),
                        n_classes
                    )));
                }
                c.label_encoder.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLabel<'a> {
    Text(&'a str),
    Code(u32),
}
