use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or validating a model bundle.
///
/// These surface when a bundle is loaded, never from `predict`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read model bundle {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read model bundle: {0}")]
    Read(#[from] std::io::Error),

    #[error("not a model bundle (bad magic bytes)")]
    BadMagic,

    #[error("unsupported bundle format version {found} (this build reads {expected})")]
    Version { found: u32, expected: u32 },

    #[error("corrupt model bundle: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("invalid JSON model bundle: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model bundle schema mismatch: {0}")]
    Schema(String),
}

impl LoadError {
    pub(crate) fn schema(msg: impl Into<String>) -> LoadError {
        LoadError::Schema(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ModelLoad(#[from] LoadError),

    #[error("missing feature column(s): {}", names.join(", "))]
    MissingFeature { names: Vec<String> },

    #[error("label encoder has no label for class code {code}")]
    Decode { code: u32 },

    #[error("row {row}, column {column}: cannot use {value:?} as a number")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: model output overflowed to a non-finite probability")]
    NonFinite { row: usize },

    #[error("expected {expected} columns, found {found}")]
    Shape { expected: usize, found: usize },

    #[error("column {0:?} appears twice")]
    DuplicateColumn(String),

    #[error("could not encode model bundle: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
