use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use phytoscan_core::{InferenceMode, SensorReading};

use crate::util::OutputFormat;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InferenceConfig {
    pub version: String,
    /// Directory of a saved model bundle.
    pub model_dir: String,
    /// Image files and/or directories of images.
    pub inputs: Vec<String>,
    /// *.json, *.csv or *.tsv; JSON on stdout when unset.
    pub output_file: Option<String>,
    /// Field reading applied to every image; image-only inference when unset.
    pub sensors: Option<SensorReading>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            version: clap::crate_version!().to_string(),
            model_dir: String::from("phytoscan_model"),
            inputs: Vec::new(),
            output_file: Some(String::from("phytoscan_predictions.csv")),
            sensors: None,
        }
    }
}

impl InferenceConfig {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Config file is not valid JSON: {:?}", config_path))?;
        let mut config = InferenceConfig::default();

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

        load_or_default!(model_dir);
        load_or_default!(inputs);
        load_or_default!(output_file);
        load_or_default!(sensors);

        Ok(config)
    }

    pub fn from_arguments(config_path: Option<&Path>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => InferenceConfig::load(path)?,
            None => InferenceConfig {
                output_file: None,
                ..InferenceConfig::default()
            },
        };

        // Apply CLI overrides
        if let Some(model_dir) = matches.get_one::<String>("model_dir") {
            config.model_dir = model_dir.clone();
        }
        if let Some(images) = matches.get_many::<String>("image") {
            config.inputs = images.cloned().collect();
        }
        if let Some(output_file) = matches.get_one::<String>("output_file") {
            config.output_file = Some(output_file.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// A missing model directory is left to the bundle loader so the
    /// failure is reported as a model-not-loaded error.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            anyhow::bail!("No input images given");
        }
        if let Some(output_file) = &self.output_file {
            OutputFormat::from_path(output_file)?;
        }
        Ok(())
    }

    pub fn mode(&self) -> InferenceMode {
        match self.sensors {
            Some(reading) => InferenceMode::SensorBacked(reading),
            None => InferenceMode::ImageOnly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensors_select_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predict.json");
        fs::write(
            &path,
            r#"{"model_dir": "m", "inputs": ["a.png"],
                "sensors": {"soil_moisture": 30, "soil_pH": 6.4, "soil_temperature": 22,
                            "nitrogen": 40, "phosphorus": 20, "potassium": 150}}"#,
        )
        .unwrap();

        let config = InferenceConfig::load(&path).unwrap();
        assert_eq!(config.inputs, vec!["a.png".to_string()]);
        match config.mode() {
            InferenceMode::SensorBacked(reading) => assert_eq!(reading.soil_ph, 6.4),
            InferenceMode::ImageOnly => panic!("expected sensor-backed mode"),
        }
        assert_eq!(InferenceConfig::default().mode(), InferenceMode::ImageOnly);
    }
}
