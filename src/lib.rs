//! Load a trained credit-risk classifier bundle and score new
//! customer rows with it.
//!
//! ```no_run
//! use riskpredict::{Frame, ModelBundle, Predictor};
//!
//! let bundle = ModelBundle::load("models/credit_risk.rpmb")?;
//! let predictor = Predictor::new(bundle);
//! let rows = Frame::read_json_lines(std::io::stdin().lock())?;
//! let out = predictor.predict(&rows)?;
//! for (label, proba) in out.iter() {
//!     println!("{} {:?}", label, proba);
//! }
//! # Ok::<(), riskpredict::Error>(())
//! ```

pub mod bundle;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod model;
pub mod predictor;
pub mod utils;

pub use bundle::ModelBundle;
pub use classifier::{Classifier, DirectLabelClassifier, EncodedLabelClassifier, RawLabel};
pub use config::Config;
pub use encoder::LabelEncoder;
pub use error::{Error, LoadError, Result};
pub use frame::{FeatureMatrix, Frame, Value};
pub use model::{Model, ProbabilisticModel};
pub use predictor::{PredictOptions, Predictions, Predictor, ProbabilityOrder};
