use crate::error::{Error, Result};
use crate::predictor::{PredictOptions, ProbabilityOrder};
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings read from a TOML file.  Every key is optional.
///
/// ```toml
/// [model]
/// path = "models/credit_risk.rpmb"
///
/// [predict]
/// parallel_threshold = 1024
/// probability_order = "class_names"
/// batch_size = 4096
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub predict: PredictConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictConfig {
    /// Batches at least this big are scored on the rayon pool.
    pub parallel_threshold: usize,
    pub probability_order: ProbabilityOrder,
    /// Rows read per batch by the command line tool.
    pub batch_size: usize,
}

impl Default for PredictConfig {
    fn default() -> PredictConfig {
        PredictConfig {
            parallel_threshold: 1024,
            probability_order: ProbabilityOrder::Model,
            batch_size: 4096,
        }
    }
}

impl PredictConfig {
    pub fn options(&self) -> PredictOptions {
        PredictOptions {
            parallel_threshold: self.parallel_threshold,
            probability_order: self.probability_order,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like `load`, but a file that isn't there means defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if path.exists() {
            Config::load(path)
        } else {
            Ok(Config::default())
        }
    }
}
