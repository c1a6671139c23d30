//! Training data assembly: pairing soil records with their images, drop
//! accounting, and the seeded stratified train/validation split.
use std::collections::{BTreeMap, HashMap};

use image::DynamicImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::descriptor::{extract, DESCRIPTOR_LEN};
use crate::error::{PhytoError, Result};
use crate::math::Array2;
use crate::soil::{SoilFeature, SoilRecord, NUM_SOIL_FEATURES};

/// Resolves record keys to images.
pub trait ImageSource: Sync {
    /// `None` when nothing is registered under `key`; `Some(Err(_))` when an
    /// image exists but cannot be read.
    fn load(&self, key: &str) -> Option<Result<DynamicImage>>;
}

impl ImageSource for HashMap<String, DynamicImage> {
    fn load(&self, key: &str) -> Option<Result<DynamicImage>> {
        self.get(key).map(|img| Ok(img.clone()))
    }
}

/// Records that have a usable image, with their descriptors.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub records: Vec<SoilRecord>,
    /// One 135-float descriptor row per entry of `records`.
    pub descriptors: Array2<f32>,
    /// Records offered, before matching.
    pub n_total: usize,
    /// Records without an image under their key.
    pub n_missing_image: usize,
    /// Records whose image could not be decoded or described.
    pub n_failed_image: usize,
}

impl TrainingSet {
    /// Extract descriptors for every record with a resolvable image. Records
    /// without one are dropped and counted, never imputed.
    pub fn assemble(records: &[SoilRecord], images: &dyn ImageSource) -> Result<Self> {
        let total = records.len();

        let extracted: Vec<Option<Result<Vec<f32>>>> = records
            .par_iter()
            .map(|record| {
                images
                    .load(&record.key)
                    .map(|img| img.and_then(|img| extract(&img)).map(|d| d.into_vec()))
            })
            .collect();

        let mut matched = Vec::new();
        let mut rows = Vec::new();
        let mut n_missing_image = 0;
        let mut n_failed_image = 0;

        for (i, (record, outcome)) in records.iter().zip(extracted).enumerate() {
            match outcome {
                None => {
                    log::trace!("No image for record '{}'", record.key);
                    n_missing_image += 1;
                }
                Some(Err(e)) => {
                    log::warn!("Skipping record '{}': {}", record.key, e);
                    n_failed_image += 1;
                }
                Some(Ok(row)) => {
                    matched.push(record.clone());
                    rows.push(row);
                }
            }
            if (i + 1) % 100 == 0 {
                log::debug!("Feature extraction: {}/{}", i + 1, total);
            }
        }

        if matched.is_empty() {
            return Err(PhytoError::InsufficientData(format!(
                "none of the {} records has a usable image",
                total
            )));
        }

        let descriptors = Array2::from_rows(DESCRIPTOR_LEN, rows)
            .map_err(|e| PhytoError::Configuration(e.to_string()))?;

        Ok(TrainingSet {
            records: matched,
            descriptors,
            n_total: total,
            n_missing_image,
            n_failed_image,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn n_dropped(&self) -> usize {
        self.n_missing_image + self.n_failed_image
    }

    pub fn labels(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.disease_type.as_str()).collect()
    }

    /// Raw soil values of the matched records, canonical column order.
    pub fn soil_matrix(&self) -> Result<Array2<f32>> {
        let mut data = Vec::with_capacity(self.len() * NUM_SOIL_FEATURES);
        for record in &self.records {
            data.extend_from_slice(record.values.as_slice());
        }
        Array2::from_shape_vec((self.len(), NUM_SOIL_FEATURES), data)
            .map_err(|e| PhytoError::Configuration(e.to_string()))
    }

    /// Raw values of one soil column of the matched records.
    pub fn target(&self, feature: SoilFeature) -> Vec<f32> {
        self.records.iter().map(|r| r.values.get(feature)).collect()
    }

    pub fn log_input_data_summary(&self) {
        log::info!("----- Training Data Summary -----");
        log::info!("{} records offered", self.n_total);
        log::info!("Images matched: {}", self.len());
        if self.n_dropped() > 0 {
            log::warn!(
                "Dropped {} records ({} without image, {} unreadable)",
                self.n_dropped(),
                self.n_missing_image,
                self.n_failed_image
            );
        }
        log::info!("---------------------------------");
    }
}

/// Row indices of a train/validation split.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Split row indices per class so each class keeps roughly
/// `validation_fraction` of its rows for validation. Every class keeps at
/// least one training row. The result depends only on `labels`, the
/// fraction and `seed`.
pub fn stratified_split(labels: &[usize], validation_fraction: f64, seed: u64) -> Split {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut validation = Vec::new();

    for (class, mut indices) in by_class {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let n_val = ((n as f64 * validation_fraction).round() as usize).min(n - 1);
        if n == 1 {
            log::warn!("Class {} has a single sample; kept for training only", class);
        }
        validation.extend_from_slice(&indices[..n_val]);
        train.extend_from_slice(&indices[n_val..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    Split { train, validation }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_stratified_and_seeded() {
        let labels: Vec<usize> = (0..40).map(|i| if i < 20 { 0 } else { 1 }).collect();
        let a = stratified_split(&labels, 0.15, 42);
        let b = stratified_split(&labels, 0.15, 42);
        assert_eq!(a, b);
        assert_eq!(a.validation.len(), 6);
        assert_eq!(a.train.len(), 34);
        let val_class0 = a.validation.iter().filter(|&&i| labels[i] == 0).count();
        assert_eq!(val_class0, 3);
    }

    #[test]
    fn split_partitions_all_rows() {
        let labels = vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 2];
        let split = stratified_split(&labels, 0.3, 7);
        let mut all: Vec<usize> = split.train.iter().chain(&split.validation).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
    }

    #[test]
    fn singleton_class_stays_in_training() {
        let labels = vec![0, 0, 0, 0, 1];
        let split = stratified_split(&labels, 0.5, 1);
        assert!(split.train.contains(&4));
        assert!(!split.validation.contains(&4));
    }
}
