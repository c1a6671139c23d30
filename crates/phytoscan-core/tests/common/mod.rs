#![allow(dead_code)]

use std::collections::HashMap;

use image::{DynamicImage, Rgb, RgbImage};
use phytoscan_core::{
    extract_scalars, GbdtParams, SoilFeature, SoilRecord, SoilValues, TrainerConfig,
};

/// Mostly green leaf with a faint vertical gradient.
pub fn green_leaf(seed: u32) -> DynamicImage {
    let img = RgbImage::from_fn(64, 48, |x, y| {
        let shade = ((x + y + seed) % 17) as u8;
        Rgb([20 + shade, 170 + shade * 2, 30 + shade])
    });
    DynamicImage::ImageRgb8(img)
}

/// Green leaf covered in brown blotches.
pub fn spotted_leaf(seed: u32) -> DynamicImage {
    let img = RgbImage::from_fn(64, 48, |x, y| {
        let blotch = ((x / 6 + y / 6 + seed) % 3) == 0;
        if blotch {
            Rgb([110 + (seed % 7) as u8, 60, 20])
        } else {
            Rgb([40, 150 + ((x + seed) % 11) as u8, 40])
        }
    });
    DynamicImage::ImageRgb8(img)
}

pub fn small_config() -> TrainerConfig {
    let params = GbdtParams {
        learning_rate: 0.3,
        max_depth: 3,
        num_boost_round: 15,
        min_leaf_size: 1,
        data_sample_ratio: 1.0,
        training_optimization_level: 2,
        debug: false,
    };
    TrainerConfig {
        classifier: params.clone(),
        regressor: params,
        validation_fraction: 0.2,
        seed: 42,
    }
}

fn record_for(key: &str, label: &str, image: &DynamicImage, moisture: f32) -> SoilRecord {
    let scalars = extract_scalars(image).expect("synthetic images are valid");
    let mut values = SoilValues::default();
    values.set(SoilFeature::SoilMoisture, moisture);
    values.set(SoilFeature::SoilPh, 5.5 + moisture / 40.0);
    values.set(SoilFeature::SoilTemperature, 21.0);
    values.set(SoilFeature::Nitrogen, 40.0 + moisture / 2.0);
    values.set(SoilFeature::Phosphorus, 18.0);
    values.set(SoilFeature::Potassium, 150.0);
    for (feature, value) in scalars.iter() {
        values.set(feature, value);
    }
    SoilRecord {
        key: key.to_string(),
        values,
        disease_type: label.to_string(),
    }
}

/// `per_class` healthy and spotted records, each with its image. Sensor
/// columns carry no class signal, so only the leaf decides the label.
pub fn synthetic_dataset(per_class: u32) -> (Vec<SoilRecord>, HashMap<String, DynamicImage>) {
    let mut records = Vec::new();
    let mut images = HashMap::new();
    for i in 0..per_class {
        let key = format!("healthy_{:03}.png", i);
        let img = green_leaf(i);
        records.push(record_for(&key, "Healthy", &img, 30.0 + i as f32));
        images.insert(key, img);

        let key = format!("blight_{:03}.png", i);
        let img = spotted_leaf(i);
        records.push(record_for(&key, "Blight", &img, 30.0 + i as f32));
        images.insert(key, img);
    }
    (records, images)
}
