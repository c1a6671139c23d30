//! Fits the classifier and the per-attribute soil regressors from soil
//! records paired with leaf images.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bundle::{FittedModel, SoilRegressors};
use crate::config::TrainerConfig;
use crate::data_handling::{stratified_split, ImageSource, TrainingSet};
use crate::error::{PhytoError, Result};
use crate::features::{combine_matrix, image_column_names};
use crate::models::{ClassifierModel, GBDTClassifier, GBDTRegressor, RegressorModel};
use crate::preprocessing::{LabelEncoder, StandardScaler};
use crate::soil::{SoilFeature, SoilRecord, SoilTable};
use crate::stats::{accuracy, rmse};

/// Validation error of one soil regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRmse {
    pub attribute: String,
    /// `None` when the validation split is empty.
    pub rmse: Option<f64>,
}

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub bundle_id: String,
    pub created_at: DateTime<Utc>,
    pub n_records: usize,
    /// Rows actually used for fitting: `n_records` minus the dropped ones.
    pub n_matched: usize,
    pub n_missing_image: usize,
    pub n_failed_image: usize,
    pub classes: Vec<String>,
    pub n_train: usize,
    pub n_validation: usize,
    pub validation_accuracy: Option<f64>,
    pub rmse: Vec<AttributeRmse>,
}

impl TrainingReport {
    pub fn n_dropped(&self) -> usize {
        self.n_missing_image + self.n_failed_image
    }

    pub fn log_summary(&self) {
        log::info!("----- Training Report ({}) -----", self.bundle_id);
        log::info!("Classes: {:?}", self.classes);
        log::info!(
            "Trained on {} of {} records ({} train / {} validation)",
            self.n_matched,
            self.n_records,
            self.n_train,
            self.n_validation
        );
        match self.validation_accuracy {
            Some(acc) => log::info!("Validation accuracy: {:.4}", acc),
            None => log::info!("Validation accuracy: n/a (empty validation split)"),
        }
        for entry in &self.rmse {
            match entry.rmse {
                Some(r) => log::info!("  {:<22} RMSE {:.4}", entry.attribute, r),
                None => log::info!("  {:<22} RMSE n/a", entry.attribute),
            }
        }
    }
}

/// A fitted bundle together with the report of the run that produced it.
pub struct TrainOutcome {
    pub model: FittedModel,
    pub report: TrainingReport,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Trainer { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train from a columnar soil table. Fails with a configuration error
    /// when an expected column is absent.
    pub fn train_table(&self, table: &SoilTable, images: &dyn ImageSource) -> Result<TrainOutcome> {
        let records = table.records()?;
        self.train(&records, images)
    }

    pub fn train(&self, records: &[SoilRecord], images: &dyn ImageSource) -> Result<TrainOutcome> {
        require_two_classes(records.iter().map(|r| r.disease_type.as_str()), "records")?;

        let data = TrainingSet::assemble(records, images)?;
        data.log_input_data_summary();

        let labels = data.labels();
        require_two_classes(labels.iter().copied(), "records with a matched image")?;
        let (label_encoder, y) = LabelEncoder::fit_transform(&labels)?;

        let soil = data.soil_matrix()?;
        let tabular_scaler = StandardScaler::fit(SoilFeature::names(), &soil)?;
        let image_scaler = StandardScaler::fit(image_column_names(), &data.descriptors)?;

        let soil_scaled = tabular_scaler.transform(&soil)?;
        let image_scaled = image_scaler.transform(&data.descriptors)?;
        let combined = combine_matrix(&image_scaled, &soil_scaled)?;

        let split = stratified_split(&y, self.config.validation_fraction, self.config.seed);
        log::info!(
            "Split: {} train / {} validation rows",
            split.train.len(),
            split.validation.len()
        );

        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
        let y_val: Vec<usize> = split.validation.iter().map(|&i| y[i]).collect();

        let mut classifier = GBDTClassifier::new(self.config.classifier.clone());
        classifier.fit(
            &combined.select_rows(&split.train),
            &y_train,
            label_encoder.n_classes(),
        )?;

        let validation_accuracy = if split.validation.is_empty() {
            None
        } else {
            let predicted = classifier.predict(&combined.select_rows(&split.validation))?;
            accuracy(&predicted, &y_val)
        };
        if validation_accuracy.is_none() {
            log::warn!("Validation split is empty; metrics not reported");
        }

        let soil_train = soil_scaled.select_rows(&split.train);
        let soil_val = soil_scaled.select_rows(&split.validation);

        let fitted: Vec<(GBDTRegressor, Option<f64>)> = SoilFeature::ALL
            .par_iter()
            .map(|&feature| {
                let target = data.target(feature);
                let train_target: Vec<f32> = split.train.iter().map(|&i| target[i]).collect();
                let val_target: Vec<f32> = split.validation.iter().map(|&i| target[i]).collect();

                let mut regressor = GBDTRegressor::new(self.config.regressor.clone());
                regressor.fit(&soil_train, &train_target)?;

                let error = if val_target.is_empty() {
                    None
                } else {
                    rmse(&regressor.predict(&soil_val)?, &val_target)
                };
                log::debug!("Fitted regressor for {}", feature);
                Ok((regressor, error))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut regressors = Vec::with_capacity(fitted.len());
        let mut errors = Vec::with_capacity(fitted.len());
        for (feature, (regressor, error)) in SoilFeature::ALL.iter().zip(fitted) {
            regressors.push(regressor);
            errors.push(AttributeRmse {
                attribute: feature.name().to_string(),
                rmse: error,
            });
        }

        let model = FittedModel::new(
            classifier,
            tabular_scaler,
            image_scaler,
            label_encoder,
            SoilRegressors::new(regressors)?,
        )?;

        let report = TrainingReport {
            bundle_id: model.bundle_id().to_string(),
            created_at: model.manifest.created_at,
            n_records: data.n_total,
            n_matched: data.len(),
            n_missing_image: data.n_missing_image,
            n_failed_image: data.n_failed_image,
            classes: model.classes().to_vec(),
            n_train: split.train.len(),
            n_validation: split.validation.len(),
            validation_accuracy,
            rmse: errors,
        };
        report.log_summary();

        Ok(TrainOutcome { model, report })
    }
}

fn require_two_classes<'a, I>(labels: I, what: &str) -> Result<()>
where
    I: Iterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = labels.collect();
    if distinct.len() < 2 {
        return Err(PhytoError::InsufficientData(format!(
            "need at least 2 distinct disease types among {}, found {}",
            what,
            distinct.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilValues;
    use std::collections::HashMap;

    fn record(key: &str, label: &str) -> SoilRecord {
        SoilRecord {
            key: key.to_string(),
            values: SoilValues::default(),
            disease_type: label.to_string(),
        }
    }

    #[test]
    fn single_class_is_insufficient() {
        let trainer = Trainer::new(TrainerConfig::default()).unwrap();
        let records = vec![record("a", "Rust"), record("b", "Rust")];
        let images: HashMap<String, image::DynamicImage> = HashMap::new();
        let err = trainer.train(&records, &images).err().unwrap();
        assert!(matches!(err, PhytoError::InsufficientData(_)), "{}", err);
    }

    #[test]
    fn no_matched_images_is_insufficient() {
        let trainer = Trainer::new(TrainerConfig::default()).unwrap();
        let records = vec![record("a", "Rust"), record("b", "Healthy")];
        let images: HashMap<String, image::DynamicImage> = HashMap::new();
        let err = trainer.train(&records, &images).err().unwrap();
        assert!(matches!(err, PhytoError::InsufficientData(_)), "{}", err);
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        let config = TrainerConfig {
            validation_fraction: 1.5,
            ..TrainerConfig::default()
        };
        assert!(matches!(Trainer::new(config), Err(PhytoError::Configuration(_))));
    }
}
