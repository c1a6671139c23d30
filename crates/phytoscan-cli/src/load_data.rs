use anyhow::{Context, Result};

use phytoscan_core::io::{read_soil_csv, ImageDir};
use phytoscan_core::SoilTable;

use crate::train::input::TrainConfig;

/// Soil table and image directory named by a training configuration.
pub fn load_training_inputs(config: &TrainConfig) -> Result<(SoilTable, ImageDir)> {
    let table = read_soil_csv(&config.soil_data)
        .with_context(|| format!("Failed to load soil data: {}", config.soil_data))?;
    log::info!("Loaded {} soil records from {}", table.len(), config.soil_data);

    let images = ImageDir::new(&config.image_dir)
        .with_context(|| format!("Failed to open image directory: {}", config.image_dir))?;

    Ok((table, images))
}
