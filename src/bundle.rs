//! The model bundle: a trained classifier plus the metadata needed
//! to feed it, persisted as one file.
//!
//! Binary layout:
//!
//! ```text
//! b"RPMB"  format version (u32, little endian)  lz4 frame( bincode(ModelBundle) )
//! ```
//!
//! Files ending in `.json` hold the same bundle as JSON, with a
//! `format_version` key next to the bundle fields.
//!
//! A bundle is validated whenever it is built or loaded, and cannot
//! be changed afterwards. Only the private schema types below derive
//! the serde and bincode traits, so every decoded bundle goes through
//! `validate`.

use crate::classifier::Classifier;
use crate::encoder::LabelEncoder;
use crate::error::{LoadError, Result};
use crate::model::{Model, ProbabilisticModel};
use bincode::{decode_from_std_read, encode_into_std_write, Decode};
use bytesize::ByteSize;
use log::{info, warn};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"RPMB";
pub const FORMAT_VERSION: u32 = 1;

/// Largest decoded payload accepted from a binary bundle (256 MiB).
/// Length prefixes claiming more than this fail to decode instead of
/// being allocated.
pub const MAX_BUNDLE_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    classifier: Classifier,
    feature_names: Vec<String>,
    class_names: Vec<String>,
}

/// Binary payload. Field order matches what `write_to` encodes.
#[derive(Decode)]
struct BundleSchema {
    classifier: Classifier,
    feature_names: Vec<String>,
    class_names: Vec<String>,
}

#[derive(Deserialize)]
struct JsonBundle {
    format_version: u32,
    classifier: Classifier,
    feature_names: Vec<String>,
    class_names: Vec<String>,
}

#[derive(Serialize)]
struct JsonBundleRef<'a> {
    format_version: u32,
    classifier: &'a Classifier,
    feature_names: &'a [String],
    class_names: &'a [String],
}

fn is_json(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("json"))
}

impl ModelBundle {
    pub fn new<S: Into<String>, T: Into<String>>(
        classifier: Classifier,
        feature_names: impl IntoIterator<Item = S>,
        class_names: impl IntoIterator<Item = T>,
    ) -> std::result::Result<ModelBundle, LoadError> {
        ModelBundle::from_parts(
            classifier,
            feature_names.into_iter().map(Into::into).collect(),
            class_names.into_iter().map(Into::into).collect(),
        )
    }

    fn from_parts(
        classifier: Classifier,
        feature_names: Vec<String>,
        class_names: Vec<String>,
    ) -> std::result::Result<ModelBundle, LoadError> {
        let bundle = ModelBundle {
            classifier,
            feature_names,
            class_names,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn model(&self) -> &Model {
        self.classifier.model()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn label_encoder(&self) -> Option<&LabelEncoder> {
        self.classifier.label_encoder()
    }

    /// Load a bundle, picking the format from the file extension.
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<ModelBundle, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        let reader = BufReader::new(file);
        let bundle = if is_json(path) {
            ModelBundle::read_json(reader)?
        } else {
            ModelBundle::read_from(reader)?
        };
        info!(
            "loaded {} model bundle {} ({}): {} features, {} classes",
            bundle.model().kind(),
            path.display(),
            ByteSize::b(size),
            bundle.feature_names.len(),
            bundle.class_names.len()
        );
        Ok(bundle)
    }

    /// Read the binary format.
    pub fn read_from(mut reader: impl Read) -> std::result::Result<ModelBundle, LoadError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => LoadError::BadMagic,
            _ => LoadError::Read(e),
        })?;
        if &magic != MAGIC {
            return Err(LoadError::BadMagic);
        }
        let mut version = [0u8; 4];
        reader.read_exact(&mut version)?;
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(LoadError::Version {
                found: version,
                expected: FORMAT_VERSION,
            });
        }
        let mut decompressed = FrameDecoder::new(reader);
        let config = bincode::config::standard().with_limit::<MAX_BUNDLE_SIZE>();
        let schema: BundleSchema = decode_from_std_read(&mut decompressed, config)?;
        ModelBundle::from_parts(schema.classifier, schema.feature_names, schema.class_names)
    }

    pub fn read_json(reader: impl Read) -> std::result::Result<ModelBundle, LoadError> {
        let file: JsonBundle = serde_json::from_reader(reader)?;
        if file.format_version != FORMAT_VERSION {
            return Err(LoadError::Version {
                found: file.format_version,
                expected: FORMAT_VERSION,
            });
        }
        ModelBundle::from_parts(file.classifier, file.feature_names, file.class_names)
    }

    /// Save a bundle, picking the format from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut outfp = BufWriter::new(File::create(path)?);
        if is_json(path) {
            self.write_json(&mut outfp)?;
        } else {
            self.write_to(&mut outfp)?;
        }
        outfp.flush()?;
        info!(
            "saved {} model bundle to {}",
            self.model().kind(),
            path.display()
        );
        Ok(())
    }

    /// Write the binary format.
    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        let mut compressed = FrameEncoder::new(writer);
        let config = bincode::config::standard();
        encode_into_std_write(&self.classifier, &mut compressed, config)?;
        encode_into_std_write(&self.feature_names, &mut compressed, config)?;
        encode_into_std_write(&self.class_names, &mut compressed, config)?;
        let mut writer = compressed.finish().map_err(io::Error::from)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_json(&self, writer: impl Write) -> Result<()> {
        let file = JsonBundleRef {
            format_version: FORMAT_VERSION,
            classifier: &self.classifier,
            feature_names: &self.feature_names,
            class_names: &self.class_names,
        };
        serde_json::to_writer_pretty(writer, &file)?;
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), LoadError> {
        self.classifier.validate()?;

        let mut seen = HashSet::new();
        if let Some(dup) = self.feature_names.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(LoadError::schema(format!(
                "feature {:?} is listed twice",
                dup
            )));
        }

        let model = self.classifier.model();
        if let Some(n) = model.n_features() {
            if n != self.feature_names.len() {
                return Err(LoadError::schema(format!(
                    "{} feature names, model expects {}",
                    self.feature_names.len(),
                    n
                )));
            }
        }

        if self.class_names.len() != model.n_classes() {
            return Err(LoadError::schema(format!(
                "{} class names, model has {} classes",
                self.class_names.len(),
                model.n_classes()
            )));
        }

        if let Ok(labels) = self.classifier.labels() {
            if labels != self.class_names {
                warn!(
                    "class_names {:?} differ from classifier order {:?}; probabilities follow classifier order",
                    self.class_names, labels
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Forest, PriorModel, Tree};

    fn prior_bundle() -> ModelBundle {
        ModelBundle::new(
            Classifier::direct(
                Model::Prior(PriorModel::constant(4, 0)),
                ["P1", "P2", "P3", "P4"],
            ),
            ["age", "income"],
            ["P1", "P2", "P3", "P4"],
        )
        .unwrap()
    }

    fn forest_bundle() -> ModelBundle {
        let mut forest = Forest::new(2, 3);
        forest.push_tree(Tree::stump(0, 40.0, 1.0, -1.0, true), 0);
        forest.push_tree(Tree::stump(1, 30000.0, 1.0, 0.0, false), 1);
        forest.push_tree(Tree::leaf(0.1), 2);
        ModelBundle::new(
            Classifier::encoded(Model::Forest(forest), LabelEncoder::new(["P1", "P2", "P3"])),
            ["age", "income"],
            ["P1", "P2", "P3"],
        )
        .unwrap()
    }

    #[test]
    fn binary_format_round_trips() {
        let bundle = forest_bundle();
        let mut buf = Vec::new();
        bundle.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..4], MAGIC);
        let loaded = ModelBundle::read_from(buf.as_slice()).unwrap();
        assert_eq!(loaded, bundle);
        assert!(loaded.label_encoder().is_some());
    }

    #[test]
    fn json_format_round_trips() {
        let bundle = prior_bundle();
        let mut buf = Vec::new();
        bundle.write_json(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("\"format_version\": 1"), "{}", text);
        let loaded = ModelBundle::read_json(buf.as_slice()).unwrap();
        assert_eq!(loaded, bundle);
        assert!(loaded.label_encoder().is_none());
    }

    #[test]
    fn foreign_bytes_are_rejected() {
        assert!(matches!(
            ModelBundle::read_from(&b"PK\x03\x04 not a bundle"[..]),
            Err(LoadError::BadMagic)
        ));
        assert!(matches!(
            ModelBundle::read_from(&b"RP"[..]),
            Err(LoadError::BadMagic)
        ));
    }

    #[test]
    fn newer_versions_are_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            ModelBundle::read_from(buf.as_slice()),
            Err(LoadError::Version { found: 7, .. })
        ));
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        let mut enc = FrameEncoder::new(buf);
        enc.write_all(payload).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let mut buf = Vec::new();
        forest_bundle().write_to(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(matches!(
            ModelBundle::read_from(buf.as_slice()),
            Err(LoadError::Decode(_))
        ));
    }

    #[test]
    fn oversized_length_prefix_is_corrupt() {
        // direct labels, linear model, one feature, then a weight
        // vector claiming u64::MAX / 16 entries
        let mut payload = vec![0u8, 0, 1, 253];
        payload.extend_from_slice(&(u64::MAX / 16).to_le_bytes());
        assert!(matches!(
            ModelBundle::read_from(framed(&payload).as_slice()),
            Err(LoadError::Decode(bincode::error::DecodeError::LimitExceeded))
        ));
    }

    #[test]
    fn decoded_payload_is_validated() {
        // direct labels, prior model [0.0, 1.0], one class label,
        // no features, no class names
        let mut payload = vec![0u8, 2, 2];
        payload.extend_from_slice(&0.0f64.to_le_bytes());
        payload.extend_from_slice(&1.0f64.to_le_bytes());
        payload.extend_from_slice(&[1, 2, b'P', b'1', 0, 0]);
        assert!(matches!(
            ModelBundle::read_from(framed(&payload).as_slice()),
            Err(LoadError::Schema(_))
        ));
    }

    #[test]
    fn inconsistent_json_is_rejected() {
        let text = r#"{
            "format_version": 1,
            "classifier": {
                "labels": "direct",
                "model": {"type": "prior", "priors": [0.0, 1.0]},
                "classes": ["P1"]
            },
            "feature_names": [],
            "class_names": ["P1", "P2"]
        }"#;
        assert!(matches!(
            ModelBundle::read_json(text.as_bytes()),
            Err(LoadError::Schema(_))
        ));
    }

    struct Unreadable;

    impl Read for Unreadable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn read_failures_are_not_bad_magic() {
        match ModelBundle::read_from(Unreadable) {
            Err(LoadError::Read(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[test]
    fn feature_count_must_match_model() {
        let forest = Forest::new(3, 1);
        let err = ModelBundle::new(
            Classifier::direct(Model::Forest(forest), ["good", "bad"]),
            ["age", "income"],
            ["good", "bad"],
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Schema(_)));
    }

    #[test]
    fn class_names_must_match_model() {
        let err = ModelBundle::new(
            Classifier::direct(Model::Prior(PriorModel::constant(2, 0)), ["P1", "P2"]),
            ["age"],
            ["P1", "P2", "P3"],
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Schema(_)));
    }

    #[test]
    fn duplicate_features_are_rejected() {
        let err = ModelBundle::new(
            Classifier::direct(Model::Prior(PriorModel::constant(2, 0)), ["P1", "P2"]),
            ["age", "age"],
            ["P1", "P2"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }
}
