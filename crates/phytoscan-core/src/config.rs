use serde::{Deserialize, Serialize};

use crate::error::{PhytoError, Result};

/// Hyper-parameters of one gradient-boosted tree ensemble.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GbdtParams {
    pub learning_rate: f32,
    pub max_depth: u32,
    pub num_boost_round: u32,
    pub min_leaf_size: usize,
    /// Fraction of rows sampled per boosting round.
    pub data_sample_ratio: f64,
    pub training_optimization_level: u8,
    pub debug: bool,
}

impl GbdtParams {
    pub fn new(learning_rate: f32, max_depth: u32, num_boost_round: u32) -> Self {
        Self {
            learning_rate,
            max_depth,
            num_boost_round,
            ..Self::classifier_defaults()
        }
    }

    /// Settings of the disease classifier.
    pub fn classifier_defaults() -> Self {
        Self {
            learning_rate: 0.1,
            max_depth: 5,
            num_boost_round: 200,
            min_leaf_size: 3,
            data_sample_ratio: 0.8,
            training_optimization_level: 2,
            debug: false,
        }
    }

    /// Settings of each per-attribute soil regressor.
    pub fn regressor_defaults() -> Self {
        Self {
            learning_rate: 0.1,
            max_depth: 3,
            num_boost_round: 100,
            min_leaf_size: 1,
            data_sample_ratio: 1.0,
            training_optimization_level: 2,
            debug: false,
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.num_boost_round == 0 {
            return Err(PhytoError::Configuration(format!(
                "{}: num_boost_round must be positive",
                name
            )));
        }
        if self.max_depth == 0 {
            return Err(PhytoError::Configuration(format!(
                "{}: max_depth must be positive",
                name
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PhytoError::Configuration(format!(
                "{}: learning_rate must be positive, got {}",
                name, self.learning_rate
            )));
        }
        if !(self.data_sample_ratio > 0.0 && self.data_sample_ratio <= 1.0) {
            return Err(PhytoError::Configuration(format!(
                "{}: data_sample_ratio must be in (0, 1], got {}",
                name, self.data_sample_ratio
            )));
        }
        Ok(())
    }
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self::classifier_defaults()
    }
}

/// Central configuration of a training run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainerConfig {
    pub classifier: GbdtParams,
    pub regressor: GbdtParams,
    /// Share of matched records held out for validation metrics.
    pub validation_fraction: f64,
    /// Seed of the stratified train/validation split.
    pub seed: u64,
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate("classifier")?;
        self.regressor.validate("regressor")?;
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(PhytoError::Configuration(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            classifier: GbdtParams::classifier_defaults(),
            regressor: GbdtParams::regressor_defaults(),
            validation_fraction: 0.15,
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: TrainerConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.classifier.num_boost_round, 200);
        assert_eq!(config.regressor.num_boost_round, 100);
        assert!((config.validation_fraction - 0.15).abs() < 1e-12);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let config = TrainerConfig {
            validation_fraction: 1.0,
            ..TrainerConfig::default()
        };
        assert!(matches!(config.validate(), Err(PhytoError::Configuration(_))));
    }

    #[test]
    fn rejects_zero_rounds() {
        let mut config = TrainerConfig::default();
        config.regressor.num_boost_round = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("regressor"));
    }
}
