//! Hand-engineered leaf image descriptor.
//!
//! Every image is converted to RGB and resized to a canonical 128x128 raster
//! before any statistic is computed. The descriptor is a 135-float vector
//! made of four fixed blocks:
//!
//! | range       | block                                                   |
//! |-------------|---------------------------------------------------------|
//! | `0..54`     | mean and std of R, G, B over a 3x3 grid of regions       |
//! | `54..118`   | 64-bin luminance histogram normalised to probabilities   |
//! | `118..123`  | the five [`DiseaseScalars`]                              |
//! | `123..135`  | std of R, G, B over a 2x2 grid of quadrants              |
//!
//! Grid boundaries are `floor(index * dimension / parts)`. Luminance is
//! `0.299 R + 0.587 G + 0.114 B` computed in `f32` and truncated to `u8`.
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{PhytoError, Result};
use crate::soil::SoilFeature;

/// Side length of the canonical raster.
pub const IMAGE_SIZE: u32 = 128;

pub const SPATIAL_LEN: usize = 54;
pub const HISTOGRAM_LEN: usize = 64;
pub const SCALARS_LEN: usize = 5;
pub const QUADRANT_LEN: usize = 12;
pub const DESCRIPTOR_LEN: usize = SPATIAL_LEN + HISTOGRAM_LEN + SCALARS_LEN + QUADRANT_LEN;

/// Resampling filter used to reach the canonical resolution.
pub const RESAMPLE_FILTER: FilterType = FilterType::CatmullRom;

const EPS: f64 = 1e-9;

/// The 135-float image descriptor. Always exactly [`DESCRIPTOR_LEN`] long.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageDescriptor(Vec<f32>);

impl ImageDescriptor {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn spatial(&self) -> &[f32] {
        &self.0[..SPATIAL_LEN]
    }

    pub fn histogram(&self) -> &[f32] {
        &self.0[SPATIAL_LEN..SPATIAL_LEN + HISTOGRAM_LEN]
    }

    pub fn scalars(&self) -> &[f32] {
        let start = SPATIAL_LEN + HISTOGRAM_LEN;
        &self.0[start..start + SCALARS_LEN]
    }

    pub fn quadrants(&self) -> &[f32] {
        &self.0[DESCRIPTOR_LEN - QUADRANT_LEN..]
    }
}

/// Disease-indicative scalars, also embedded in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiseaseScalars {
    pub mean_green_intensity: f32,
    pub color_variance: f32,
    pub texture_entropy: f32,
    pub spot_area_ratio: f32,
    pub disease_color_index: f32,
}

impl DiseaseScalars {
    /// Scalars keyed by their soil column, in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (SoilFeature, f32)> {
        [
            (SoilFeature::MeanGreenIntensity, self.mean_green_intensity),
            (SoilFeature::ColorVariance, self.color_variance),
            (SoilFeature::TextureEntropy, self.texture_entropy),
            (SoilFeature::SpotAreaRatio, self.spot_area_ratio),
            (SoilFeature::DiseaseColorIndex, self.disease_color_index),
        ]
        .into_iter()
    }

    pub fn to_array(&self) -> [f32; SCALARS_LEN] {
        [
            self.mean_green_intensity,
            self.color_variance,
            self.texture_entropy,
            self.spot_area_ratio,
            self.disease_color_index,
        ]
    }
}

/// An image converted to RGB at the canonical resolution, with its
/// luminance plane.
pub struct CanonicalImage {
    rgb: RgbImage,
    gray: Vec<u8>,
}

impl CanonicalImage {
    pub fn new(image: &DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PhytoError::Input(format!(
                "image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let rgb = image.to_rgb8();
        let rgb = if rgb.dimensions() == (IMAGE_SIZE, IMAGE_SIZE) {
            rgb
        } else {
            DynamicImage::ImageRgb8(rgb)
                .resize_exact(IMAGE_SIZE, IMAGE_SIZE, RESAMPLE_FILTER)
                .to_rgb8()
        };

        let gray = rgb
            .pixels()
            .map(|p| luminance(p[0], p[1], p[2]))
            .collect();

        Ok(CanonicalImage { rgb, gray })
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Luminance plane in row-major order.
    pub fn gray(&self) -> &[u8] {
        &self.gray
    }

    pub fn descriptor(&self) -> ImageDescriptor {
        self.descriptor_with(&self.scalars())
    }

    fn descriptor_with(&self, scalars: &DiseaseScalars) -> ImageDescriptor {
        let mut out = Vec::with_capacity(DESCRIPTOR_LEN);
        let (w, h) = (self.width(), self.height());

        for ri in 0..3 {
            for ci in 0..3 {
                let region = Region::grid(w, h, 3, ri, ci);
                for c in 0..3 {
                    let (mean, std) = self.channel_stats(&region, c);
                    out.push(mean as f32);
                    out.push(std as f32);
                }
            }
        }

        let counts = histogram(&self.gray, HISTOGRAM_LEN);
        let total = counts.iter().sum::<u64>() as f64 + EPS;
        out.extend(counts.iter().map(|&n| (n as f64 / total) as f32));

        out.extend_from_slice(&scalars.to_array());

        for ri in 0..2 {
            for ci in 0..2 {
                let region = Region::grid(w, h, 2, ri, ci);
                for c in 0..3 {
                    let (_, std) = self.channel_stats(&region, c);
                    out.push(std as f32);
                }
            }
        }

        debug_assert_eq!(out.len(), DESCRIPTOR_LEN);
        ImageDescriptor(out)
    }

    pub fn scalars(&self) -> DiseaseScalars {
        let n = self.gray.len() as f64;

        let mut green_sum = 0.0f64;
        let mut all_sum = 0.0f64;
        for p in self.rgb.pixels() {
            green_sum += p[1] as f64;
            all_sum += p[0] as f64 + p[1] as f64 + p[2] as f64;
        }
        let all_mean = all_sum / (3.0 * n);
        let mut sq = 0.0f64;
        for p in self.rgb.pixels() {
            for c in 0..3 {
                let d = p[c] as f64 - all_mean;
                sq += d * d;
            }
        }
        let color_variance = sq / (3.0 * n);

        let counts = histogram(&self.gray, 256);
        let total = counts.iter().sum::<u64>() as f64 + EPS;
        let entropy = counts
            .iter()
            .map(|&c| {
                let p = c as f64 / total;
                -p * (p + EPS).log2()
            })
            .sum::<f64>()
            .max(0.0);

        let gray_mean = self.gray.iter().map(|&g| g as f64).sum::<f64>() / n;
        let mut spots = 0usize;
        let mut spot_red = 0.0f64;
        let mut spot_green = 0.0f64;
        for (p, &g) in self.rgb.pixels().zip(&self.gray) {
            if (g as f64) < gray_mean {
                spots += 1;
                spot_red += p[0] as f64;
                spot_green += p[1] as f64;
            }
        }
        let disease_color_index = if spots == 0 {
            0.0
        } else {
            let k = spots as f64;
            (spot_red / k) / (spot_green / k + EPS)
        };

        DiseaseScalars {
            mean_green_intensity: (green_sum / n) as f32,
            color_variance: color_variance as f32,
            texture_entropy: entropy as f32,
            spot_area_ratio: (spots as f64 / n) as f32,
            disease_color_index: disease_color_index as f32,
        }
    }

    /// Population mean and standard deviation of one channel over a region.
    fn channel_stats(&self, region: &Region, channel: usize) -> (f64, f64) {
        let count = region.area() as f64;
        if count == 0.0 {
            return (0.0, 0.0);
        }
        let mut sum = 0.0f64;
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                sum += self.rgb.get_pixel(x, y)[channel] as f64;
            }
        }
        let mean = sum / count;
        let mut sq = 0.0f64;
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                let d = self.rgb.get_pixel(x, y)[channel] as f64 - mean;
                sq += d * d;
            }
        }
        (mean, (sq / count).sqrt())
    }
}

/// Half-open pixel rectangle.
struct Region {
    x0: u32,
    x1: u32,
    y0: u32,
    y1: u32,
}

impl Region {
    /// Cell (`row`, `col`) of a `parts x parts` grid with truncated bounds.
    fn grid(width: u32, height: u32, parts: u32, row: u32, col: u32) -> Region {
        Region {
            y0: row * height / parts,
            y1: (row + 1) * height / parts,
            x0: col * width / parts,
            x1: (col + 1) * width / parts,
        }
    }

    fn area(&self) -> u32 {
        (self.x1 - self.x0) * (self.y1 - self.y0)
    }
}

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299f32 * r as f32 + 0.587f32 * g as f32 + 0.114f32 * b as f32) as u8
}

/// Equal-width histogram of 8-bit values over the closed range [0, 255].
fn histogram(values: &[u8], bins: usize) -> Vec<u64> {
    let mut counts = vec![0u64; bins];
    let scale = bins as f64 / 255.0;
    for &v in values {
        let bin = ((v as f64) * scale).floor() as usize;
        counts[bin.min(bins - 1)] += 1;
    }
    counts
}

/// 135-float descriptor of `image`.
pub fn extract(image: &DynamicImage) -> Result<ImageDescriptor> {
    Ok(CanonicalImage::new(image)?.descriptor())
}

/// The five disease scalars of `image`.
pub fn extract_scalars(image: &DynamicImage) -> Result<DiseaseScalars> {
    Ok(CanonicalImage::new(image)?.scalars())
}

/// Descriptor and scalars from a single canonicalisation pass.
pub fn extract_all(image: &DynamicImage) -> Result<(ImageDescriptor, DiseaseScalars)> {
    let canonical = CanonicalImage::new(image)?;
    let scalars = canonical.scalars();
    Ok((canonical.descriptor_with(&scalars), scalars))
}

/// Read and decode an image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path).map_err(|e| PhytoError::Input(format!("{}: {}", path.display(), e)))
}

/// Decode an in-memory image (any format the `image` crate recognises).
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}
