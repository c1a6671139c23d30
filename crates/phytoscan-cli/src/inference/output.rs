use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};

use phytoscan_core::{InferenceMode, SoilFeature};

use crate::inference::inference::ImagePrediction;
use crate::util::OutputFormat;

const SCALAR_COLUMNS: [SoilFeature; 5] = SoilFeature::IMAGE_DERIVED;

/// Write predictions as JSON, CSV or TSV based on file extension.
pub fn write_predictions<P: AsRef<Path>>(
    predictions: &[ImagePrediction],
    classes: &[String],
    output_path: P,
) -> Result<()> {
    let path = output_path.as_ref();
    let format = OutputFormat::from_path(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;

    let delimiter = match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(BufWriter::new(file), predictions)?;
            return Ok(());
        }
        OutputFormat::Csv => b',',
        OutputFormat::Tsv => b'\t',
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(BufWriter::new(file));

    // Write headers
    let mut header: Vec<String> = [
        "image",
        "disease_type",
        "confidence",
        "health_score",
        "severity",
        "mode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(classes.iter().map(|c| format!("prob_{}", c)));
    header.extend(SoilFeature::ALL.iter().map(|f| format!("pred_{}", f.name())));
    header.extend(SCALAR_COLUMNS.iter().map(|f| f.name().to_string()));
    header.push("error_kind".to_string());
    header.push("error_message".to_string());
    writer.write_record(&header)?;

    for entry in predictions {
        let mut row = vec![entry.image.clone()];
        match &entry.result {
            Some(result) => {
                row.push(result.disease_type.clone());
                row.push(format!("{:.4}", result.confidence));
                row.push(format!("{:.4}", result.health_score));
                row.push(result.severity.to_string());
                row.push(match result.mode {
                    InferenceMode::ImageOnly => "image_only".to_string(),
                    InferenceMode::SensorBacked(_) => "sensor_backed".to_string(),
                });
                for class in classes {
                    let p = result.class_probabilities.get(class).copied().unwrap_or(0.0);
                    row.push(format!("{:.4}", p));
                }
                for feature in SoilFeature::ALL {
                    row.push(format!("{:.4}", result.soil_predictions.get(feature)));
                }
                for (_, value) in result.image_features.iter() {
                    row.push(format!("{:.6}", value));
                }
                row.push(String::new());
                row.push(String::new());
            }
            None => {
                let blanks = 5 + classes.len() + SoilFeature::ALL.len() + SCALAR_COLUMNS.len();
                row.extend(std::iter::repeat(String::new()).take(blanks));
                let (kind, message) = entry
                    .error
                    .as_ref()
                    .map(|e| (e.kind.clone(), e.message.clone()))
                    .unwrap_or_default();
                row.push(kind);
                row.push(message);
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
