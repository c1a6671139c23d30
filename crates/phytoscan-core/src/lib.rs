//! phytoscan-core: leaf disease classification and soil estimation.
//!
//! Images are reduced to a fixed 135-float descriptor, combined with the 11
//! scaled soil columns, and fed to a gradient boosted tree classifier. One
//! regressor per soil column is fitted alongside it. A training run yields a
//! [`FittedModel`] bundle that is saved and loaded as a unit and used by the
//! predictor to produce a [`PredictionResult`] with a rule-based health score.
pub mod bundle;
pub mod config;
pub mod data_handling;
pub mod descriptor;
pub mod error;
pub mod features;
pub mod io;
pub mod math;
pub mod models;
pub mod predictor;
pub mod preprocessing;
pub mod report;
pub mod soil;
pub mod stats;
pub mod trainer;

pub use bundle::{shared_model, FittedModel, LazyModel};
pub use config::{GbdtParams, TrainerConfig};
pub use descriptor::{extract, extract_scalars, DiseaseScalars, ImageDescriptor};
pub use error::{PhytoError, Result};
pub use predictor::{predict, predict_with, InferenceMode, PredictionResult, Severity};
pub use soil::{SensorReading, SoilFeature, SoilRecord, SoilTable, SoilValues};
pub use trainer::{TrainOutcome, Trainer, TrainingReport};
