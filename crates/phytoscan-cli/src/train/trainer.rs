use std::path::Path;

use anyhow::{Context, Result};

use phytoscan_core::report::save_training_report;
use phytoscan_core::{Trainer, TrainingReport};

use crate::load_data::load_training_inputs;
use crate::train::input::TrainConfig;
use crate::util::write_bytes_to_file;

pub fn run_training(config: &TrainConfig) -> Result<TrainingReport> {
    let (table, images) = load_training_inputs(config)?;

    let start_time = std::time::Instant::now();
    let trainer = Trainer::new(config.trainer.clone())?;
    let outcome = trainer.train_table(&table, &images)?;
    log::info!("Training completed in {:?}", start_time.elapsed());

    outcome
        .model
        .save(&config.model_dir)
        .with_context(|| format!("Failed to save model bundle to {}", config.model_dir))?;
    log::info!("Model bundle saved to: {}", config.model_dir);

    if let Some(report_file) = &config.report_file {
        save_training_report(report_file, &outcome.report, Some(trainer.config()))
            .with_context(|| format!("Failed to write training report: {}", report_file))?;
    }

    // Save configuration next to the bundle
    let path = Path::new(&config.model_dir).join("phytoscan_train_config.json");
    let json = serde_json::to_string_pretty(config)?;
    write_bytes_to_file(&path, json.as_bytes())
        .with_context(|| format!("Failed to write config: {:?}", path))?;

    Ok(outcome.report)
}
