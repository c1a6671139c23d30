use std::collections::HashMap;
use std::error::Error;

use image::{DynamicImage, Rgb, RgbImage};

use phytoscan_core::report::save_training_report;
use phytoscan_core::{
    extract_scalars, predict, GbdtParams, SoilFeature, SoilRecord, SoilValues, Trainer,
    TrainerConfig,
};

fn leaf(seed: u32, diseased: bool) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(96, 96, |x, y| {
        if diseased && ((x / 8 + y / 8 + seed) % 4) == 0 {
            Rgb([120, 70, 25])
        } else {
            let shade = ((x * 3 + y + seed) % 23) as u8;
            Rgb([30 + shade, 160 + shade * 2, 35])
        }
    }))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut records = Vec::new();
    let mut images = HashMap::new();
    for i in 0..40u32 {
        let diseased = i % 2 == 1;
        let key = format!("img_{:04}.png", i + 1);
        let img = leaf(i, diseased);

        let mut values = SoilValues::default();
        values.set(SoilFeature::SoilMoisture, 25.0 + (i % 7) as f32);
        values.set(SoilFeature::SoilPh, 6.0 + (i % 5) as f32 * 0.2);
        values.set(SoilFeature::SoilTemperature, 19.0 + (i % 3) as f32);
        values.set(SoilFeature::Nitrogen, 45.0);
        values.set(SoilFeature::Phosphorus, 20.0);
        values.set(SoilFeature::Potassium, 160.0);
        for (feature, value) in extract_scalars(&img)?.iter() {
            values.set(feature, value);
        }

        records.push(SoilRecord {
            key: key.clone(),
            values,
            disease_type: if diseased { "Leaf Spot" } else { "Healthy" }.to_string(),
        });
        images.insert(key, img);
    }

    let config = TrainerConfig {
        classifier: GbdtParams::new(0.1, 4, 50),
        ..TrainerConfig::default()
    };
    let trainer = Trainer::new(config)?;
    let outcome = trainer.train(&records, &images)?;

    println!("Trained on {} records", outcome.report.n_matched);
    println!("Validation accuracy: {:?}", outcome.report.validation_accuracy);

    let result = predict(&leaf(99, true), &outcome.model)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    save_training_report("report.html", &outcome.report, Some(trainer.config()))?;
    println!("Report saved to report.html");

    Ok(())
}
