//! Single-image inference against a loaded [`FittedModel`].
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::bundle::FittedModel;
use crate::descriptor::{load_image, CanonicalImage, DiseaseScalars};
use crate::error::{PhytoError, Result};
use crate::features::combine;
use crate::math::Array2;
use crate::models::{argmax, ClassifierModel};
use crate::soil::{SensorReading, SoilFeature, SoilValues};

/// Where the six sensor columns of the tabular row come from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "sensors", rename_all = "snake_case")]
pub enum InferenceMode {
    /// No field reading: sensor columns are zero, so regressor outputs for
    /// sensor attributes are not estimates of the real soil.
    #[default]
    ImageOnly,
    SensorBacked(SensorReading),
}

impl InferenceMode {
    fn sensors(&self) -> Option<&SensorReading> {
        match self {
            InferenceMode::ImageOnly => None,
            InferenceMode::SensorBacked(reading) => Some(reading),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Healthy,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Tier lower bounds are inclusive.
    pub fn from_score(health_score: f32) -> Severity {
        if health_score >= 80.0 {
            Severity::Healthy
        } else if health_score >= 60.0 {
            Severity::Mild
        } else if health_score >= 40.0 {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Healthy => "Healthy",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule-based leaf health in `[0, 100]`.
pub fn health_score(spot_area_ratio: f32, disease_color_index: f32) -> f32 {
    (100.0 - spot_area_ratio * 200.0 - (disease_color_index - 1.0) * 20.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub disease_type: String,
    /// Probability of `disease_type`, in percent.
    pub confidence: f32,
    /// Percent probability per class name.
    pub class_probabilities: BTreeMap<String, f32>,
    pub soil_predictions: SoilValues,
    pub image_features: DiseaseScalars,
    pub health_score: f32,
    pub severity: Severity,
    pub mode: InferenceMode,
}

impl PredictionResult {
    /// Regressor outputs that are meaningful in every mode.
    pub fn image_derived_predictions(&self) -> Vec<(SoilFeature, f32)> {
        SoilFeature::IMAGE_DERIVED
            .iter()
            .map(|&f| (f, self.soil_predictions.get(f)))
            .collect()
    }
}

/// Image-only prediction.
pub fn predict(image: &DynamicImage, model: &FittedModel) -> Result<PredictionResult> {
    predict_with(image, model, InferenceMode::ImageOnly)
}

pub fn predict_path<P: AsRef<Path>>(
    path: P,
    model: &FittedModel,
    mode: InferenceMode,
) -> Result<PredictionResult> {
    let image = load_image(path)?;
    predict_with(&image, model, mode)
}

pub fn predict_with(
    image: &DynamicImage,
    model: &FittedModel,
    mode: InferenceMode,
) -> Result<PredictionResult> {
    let canonical = CanonicalImage::new(image)?;
    let scalars = canonical.scalars();
    let descriptor = canonical.descriptor();

    let image_scaled = model.image_scaler.transform_row(descriptor.as_slice())?;
    let proxy = SoilValues::proxy(&scalars, mode.sensors());
    let tabular_scaled = model.tabular_scaler.transform_row(proxy.as_slice())?;

    let row = combine(&image_scaled, &tabular_scaled)?;
    let x = Array2::from_shape_vec((1, row.len()), row)
        .map_err(|e| PhytoError::Configuration(e.to_string()))?;
    let proba = model.classifier.predict_proba(&x)?;
    let proba = proba.row_slice(0);

    let best = argmax(proba);
    let disease_type = model.label_encoder.decode_label(best)?.to_string();
    let mut class_probabilities = BTreeMap::new();
    for (code, &p) in proba.iter().enumerate() {
        let name = model.label_encoder.decode_label(code)?;
        class_probabilities.insert(name.to_string(), p * 100.0);
    }

    let soil_predictions = model.regressors.predict_row(&tabular_scaled)?;

    let health = health_score(scalars.spot_area_ratio, scalars.disease_color_index);
    log::debug!(
        "Predicted {} ({:.1}%), health {:.1}",
        disease_type,
        proba[best] * 100.0,
        health
    );

    Ok(PredictionResult {
        disease_type,
        confidence: proba[best] * 100.0,
        class_probabilities,
        soil_predictions,
        image_features: scalars,
        health_score: health,
        severity: Severity::from_score(health),
        mode,
    })
}
