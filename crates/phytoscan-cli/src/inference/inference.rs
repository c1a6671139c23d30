use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use phytoscan_core::bundle::shared_model;
use phytoscan_core::io::collect_image_paths;
use phytoscan_core::predictor::predict_path;
use phytoscan_core::{FittedModel, InferenceMode, PhytoError, PredictionResult};

use crate::inference::input::InferenceConfig;
use crate::inference::output::write_predictions;

/// Mapped failure of one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

impl From<&PhytoError> for ErrorReport {
    fn from(e: &PhytoError) -> Self {
        ErrorReport {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// Outcome for one input image: exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePrediction {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl ImagePrediction {
    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}

/// Predict every image independently. Output order follows `paths`.
pub fn predict_images(
    paths: &[PathBuf],
    model: &FittedModel,
    mode: InferenceMode,
) -> Vec<ImagePrediction> {
    paths
        .par_iter()
        .map(|path| {
            let image = path.display().to_string();
            match predict_path(path, model, mode) {
                Ok(result) => ImagePrediction {
                    image,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    log::warn!("Prediction failed for {}: {}", image, e);
                    ImagePrediction {
                        image,
                        result: None,
                        error: Some(ErrorReport::from(&e)),
                    }
                }
            }
        })
        .collect()
}

pub fn run_inference(config: &InferenceConfig) -> Result<Vec<ImagePrediction>> {
    let model = shared_model(&config.model_dir)
        .with_context(|| format!("Failed to load model bundle from {}", config.model_dir))?;
    log::info!(
        "Loaded model bundle {} ({} classes)",
        model.bundle_id(),
        model.classes().len()
    );

    let paths = collect_image_paths(&config.inputs)?;
    if paths.is_empty() {
        anyhow::bail!("No images found in {:?}", config.inputs);
    }
    log::info!("Predicting {} images", paths.len());

    let start_time = std::time::Instant::now();
    let predictions = predict_images(&paths, &model, config.mode());
    log::info!("Inference completed in {:?}", start_time.elapsed());

    let n_failed = predictions.iter().filter(|p| !p.is_ok()).count();
    if n_failed > 0 {
        log::warn!("{} of {} images could not be predicted", n_failed, predictions.len());
    }

    match &config.output_file {
        Some(output_file) => {
            write_predictions(&predictions, model.classes(), Path::new(output_file))?;
            log::info!("Predictions saved to: {}", output_file);
        }
        None => println!("{}", serde_json::to_string_pretty(&predictions)?),
    }

    Ok(predictions)
}
