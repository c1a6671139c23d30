use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use phytoscan_core::TrainerConfig;

use crate::util::{validate_directory, validate_tsv_or_csv_file};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrainConfig {
    pub version: String,
    /// Soil records with a `disease_type` column (*.csv or *.tsv).
    pub soil_data: String,
    /// Directory holding the leaf images named by the record keys.
    pub image_dir: String,
    /// Directory the model bundle is written to.
    pub model_dir: String,
    pub report_file: Option<String>,
    pub trainer: TrainerConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            version: clap::crate_version!().to_string(),
            soil_data: String::new(),
            image_dir: String::new(),
            model_dir: String::from("phytoscan_model"),
            report_file: Some(String::from("phytoscan_training_report.html")),
            trainer: TrainerConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Read a JSON config. Missing or invalid fields fall back to defaults.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Config file is not valid JSON: {:?}", config_path))?;
        let mut config = TrainConfig::default();

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field), config.$field
                        );
                    }
                } else {
                    log::warn!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field), config.$field
                    );
                }
            };
        }

        load_or_default!(soil_data);
        load_or_default!(image_dir);
        load_or_default!(model_dir);
        load_or_default!(report_file);
        load_or_default!(trainer);

        Ok(config)
    }

    pub fn from_arguments(config_path: Option<&Path>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => TrainConfig::load(path)?,
            None => TrainConfig::default(),
        };

        // Apply CLI overrides
        if let Some(soil_data) = matches.get_one::<String>("soil_data") {
            config.soil_data = soil_data.clone();
        }
        if let Some(image_dir) = matches.get_one::<String>("image_dir") {
            config.image_dir = image_dir.clone();
        }
        if let Some(model_dir) = matches.get_one::<String>("model_dir") {
            config.model_dir = model_dir.clone();
        }
        if let Some(report_file) = matches.get_one::<String>("report_file") {
            config.report_file = Some(report_file.clone());
        }
        if matches.get_flag("no_report") {
            config.report_file = None;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_tsv_or_csv_file(&self.soil_data)?;
        validate_directory(&self.image_dir)?;
        self.trainer.validate()?;
        Ok(())
    }
}
