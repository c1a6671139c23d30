use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use phytoscan_core::descriptor::{extract_all, load_image};
use phytoscan_core::{DiseaseScalars, ImageDescriptor};

/// Descriptor dump of one image.
#[derive(Debug, Serialize)]
pub struct DescriptorDump {
    pub image: String,
    pub scalars: DiseaseScalars,
    pub descriptor: ImageDescriptor,
}

pub fn describe_image<P: AsRef<Path>>(path: P) -> Result<DescriptorDump> {
    let path = path.as_ref();
    let image = load_image(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let (descriptor, scalars) = extract_all(&image)?;
    Ok(DescriptorDump {
        image: path.display().to_string(),
        scalars,
        descriptor,
    })
}

pub fn run_extract<P: AsRef<Path>>(path: P) -> Result<()> {
    let dump = describe_image(path)?;
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
