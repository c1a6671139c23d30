//! Soil records and the fixed column order shared by every tabular vector.
//!
//! The 11 columns are always laid out in [`SoilFeature::ALL`] order: six
//! sensor columns followed by the five image-derived disease scalars. Every
//! scaler, regressor and proxy row in the crate relies on this order.
use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::descriptor::DiseaseScalars;
use crate::error::{PhytoError, Result};

/// Name of the categorical label column.
pub const TARGET_CLASS: &str = "disease_type";

/// Number of tabular soil columns.
pub const NUM_SOIL_FEATURES: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SoilFeature {
    SoilMoisture,
    SoilPh,
    SoilTemperature,
    Nitrogen,
    Phosphorus,
    Potassium,
    MeanGreenIntensity,
    ColorVariance,
    TextureEntropy,
    SpotAreaRatio,
    DiseaseColorIndex,
}

impl SoilFeature {
    pub const ALL: [SoilFeature; NUM_SOIL_FEATURES] = [
        SoilFeature::SoilMoisture,
        SoilFeature::SoilPh,
        SoilFeature::SoilTemperature,
        SoilFeature::Nitrogen,
        SoilFeature::Phosphorus,
        SoilFeature::Potassium,
        SoilFeature::MeanGreenIntensity,
        SoilFeature::ColorVariance,
        SoilFeature::TextureEntropy,
        SoilFeature::SpotAreaRatio,
        SoilFeature::DiseaseColorIndex,
    ];

    /// Columns measured by field sensors.
    pub const SENSOR: [SoilFeature; 6] = [
        SoilFeature::SoilMoisture,
        SoilFeature::SoilPh,
        SoilFeature::SoilTemperature,
        SoilFeature::Nitrogen,
        SoilFeature::Phosphorus,
        SoilFeature::Potassium,
    ];

    /// Columns computed from the leaf photograph.
    pub const IMAGE_DERIVED: [SoilFeature; 5] = [
        SoilFeature::MeanGreenIntensity,
        SoilFeature::ColorVariance,
        SoilFeature::TextureEntropy,
        SoilFeature::SpotAreaRatio,
        SoilFeature::DiseaseColorIndex,
    ];

    /// Column header as it appears in soil CSV files.
    pub fn name(self) -> &'static str {
        match self {
            SoilFeature::SoilMoisture => "soil_moisture",
            SoilFeature::SoilPh => "soil_pH",
            SoilFeature::SoilTemperature => "soil_temperature",
            SoilFeature::Nitrogen => "nitrogen",
            SoilFeature::Phosphorus => "phosphorus",
            SoilFeature::Potassium => "potassium",
            SoilFeature::MeanGreenIntensity => "mean_green_intensity",
            SoilFeature::ColorVariance => "color_variance",
            SoilFeature::TextureEntropy => "texture_entropy",
            SoilFeature::SpotAreaRatio => "spot_area_ratio",
            SoilFeature::DiseaseColorIndex => "disease_color_index",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column names in canonical order.
    pub fn names() -> Vec<String> {
        SoilFeature::ALL.iter().map(|f| f.name().to_string()).collect()
    }
}

impl fmt::Display for SoilFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per soil column, stored in canonical order.
///
/// Serialized as a map keyed by column name, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SoilValues([f32; NUM_SOIL_FEATURES]);

impl SoilValues {
    pub fn new(values: [f32; NUM_SOIL_FEATURES]) -> Self {
        SoilValues(values)
    }

    pub fn get(&self, feature: SoilFeature) -> f32 {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: SoilFeature, value: f32) {
        self.0[feature.index()] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (SoilFeature, f32)> + '_ {
        SoilFeature::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    /// Tabular proxy row for inference: the image-derived columns come from
    /// `scalars`, the sensor columns from `sensors` or 0.0 when no reading is
    /// available.
    pub fn proxy(scalars: &DiseaseScalars, sensors: Option<&SensorReading>) -> Self {
        let mut values = SoilValues::default();
        if let Some(reading) = sensors {
            for feature in SoilFeature::SENSOR {
                values.set(feature, reading.get(feature));
            }
        }
        for (feature, value) in scalars.iter() {
            values.set(feature, value);
        }
        values
    }
}

impl Serialize for SoilValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_SOIL_FEATURES))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SoilValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = BTreeMap::<String, f32>::deserialize(deserializer)?;
        let mut values = SoilValues::default();
        for feature in SoilFeature::ALL {
            let value = map
                .get(feature.name())
                .ok_or_else(|| D::Error::missing_field(feature.name()))?;
            values.set(feature, *value);
        }
        Ok(values)
    }
}

/// Field sensor measurements for one plot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading {
    pub soil_moisture: f32,
    #[serde(rename = "soil_pH")]
    pub soil_ph: f32,
    pub soil_temperature: f32,
    pub nitrogen: f32,
    pub phosphorus: f32,
    pub potassium: f32,
}

impl SensorReading {
    /// Value of a sensor column; image-derived columns read as 0.0.
    pub fn get(&self, feature: SoilFeature) -> f32 {
        match feature {
            SoilFeature::SoilMoisture => self.soil_moisture,
            SoilFeature::SoilPh => self.soil_ph,
            SoilFeature::SoilTemperature => self.soil_temperature,
            SoilFeature::Nitrogen => self.nitrogen,
            SoilFeature::Phosphorus => self.phosphorus,
            SoilFeature::Potassium => self.potassium,
            _ => 0.0,
        }
    }
}

/// One labelled training row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilRecord {
    /// Key of the image paired with this record.
    pub key: String,
    pub values: SoilValues,
    pub disease_type: String,
}

/// Default image key of the record at `row` when the data carries none.
pub fn default_image_key(row: usize) -> String {
    format!("img_{:04}.png", (row % 1000) + 1)
}

/// Column-oriented soil data as loaded from an external source, before the
/// expected columns have been checked.
#[derive(Debug, Clone, Default)]
pub struct SoilTable {
    keys: Vec<String>,
    columns: Vec<(String, Vec<f32>)>,
    labels: Option<Vec<String>>,
}

impl SoilTable {
    pub fn new(
        keys: Vec<String>,
        columns: Vec<(String, Vec<f32>)>,
        labels: Option<Vec<String>>,
    ) -> Result<Self> {
        let n = keys.len();
        for (name, values) in &columns {
            if values.len() != n {
                return Err(PhytoError::Configuration(format!(
                    "column '{}' has {} values, expected {}",
                    name,
                    values.len(),
                    n
                )));
            }
        }
        if let Some(labels) = &labels {
            if labels.len() != n {
                return Err(PhytoError::Configuration(format!(
                    "column '{}' has {} values, expected {}",
                    TARGET_CLASS,
                    labels.len(),
                    n
                )));
            }
        }
        Ok(SoilTable {
            keys,
            columns,
            labels,
        })
    }

    pub fn from_records(records: &[SoilRecord]) -> Self {
        let columns = SoilFeature::ALL
            .iter()
            .map(|&f| {
                (
                    f.name().to_string(),
                    records.iter().map(|r| r.values.get(f)).collect(),
                )
            })
            .collect();
        SoilTable {
            keys: records.iter().map(|r| r.key.clone()).collect(),
            columns,
            labels: Some(records.iter().map(|r| r.disease_type.clone()).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f32]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Typed records. Fails with a configuration error naming the first
    /// expected column absent from the table.
    pub fn records(&self) -> Result<Vec<SoilRecord>> {
        let mut columns = Vec::with_capacity(NUM_SOIL_FEATURES);
        for feature in SoilFeature::ALL {
            let column = self.column(feature.name()).ok_or_else(|| {
                PhytoError::Configuration(format!("missing soil column '{}'", feature.name()))
            })?;
            columns.push(column);
        }
        let labels = self.labels.as_ref().ok_or_else(|| {
            PhytoError::Configuration(format!("missing label column '{}'", TARGET_CLASS))
        })?;

        Ok((0..self.len())
            .map(|row| {
                let mut values = SoilValues::default();
                for (feature, column) in SoilFeature::ALL.iter().zip(&columns) {
                    values.set(*feature, column[row]);
                }
                SoilRecord {
                    key: self.keys[row].clone(),
                    values,
                    disease_type: labels[row].clone(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_columns(n: usize) -> Vec<(String, Vec<f32>)> {
        SoilFeature::ALL
            .iter()
            .map(|f| (f.name().to_string(), vec![f.index() as f32; n]))
            .collect()
    }

    #[test]
    fn canonical_order_puts_sensors_first() {
        assert_eq!(SoilFeature::ALL.len(), 11);
        for (i, f) in SoilFeature::ALL.iter().enumerate() {
            assert_eq!(f.index(), i);
        }
        assert_eq!(SoilFeature::ALL[..6], SoilFeature::SENSOR);
        assert_eq!(SoilFeature::ALL[6..], SoilFeature::IMAGE_DERIVED);
        assert_eq!(SoilFeature::SoilPh.name(), "soil_pH");
    }

    #[test]
    fn default_key_wraps_every_thousand_rows() {
        assert_eq!(default_image_key(0), "img_0001.png");
        assert_eq!(default_image_key(999), "img_1000.png");
        assert_eq!(default_image_key(1000), "img_0001.png");
    }

    #[test]
    fn records_name_the_missing_column() {
        let mut columns = full_columns(2);
        columns.retain(|(name, _)| name != "potassium");
        let table = SoilTable::new(
            vec!["a".into(), "b".into()],
            columns,
            Some(vec!["x".into(), "y".into()]),
        )
        .unwrap();
        let err = table.records().unwrap_err();
        assert!(matches!(err, PhytoError::Configuration(_)));
        assert!(err.to_string().contains("potassium"), "{}", err);
    }

    #[test]
    fn records_require_label_column() {
        let table = SoilTable::new(vec!["a".into()], full_columns(1), None).unwrap();
        let err = table.records().unwrap_err();
        assert!(err.to_string().contains(TARGET_CLASS));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let mut columns = full_columns(2);
        columns[3].1.pop();
        let result = SoilTable::new(vec!["a".into(), "b".into()], columns, None);
        assert!(matches!(result, Err(PhytoError::Configuration(_))));
    }

    #[test]
    fn values_serialize_as_named_map() {
        let mut values = SoilValues::default();
        values.set(SoilFeature::SoilPh, 6.5);
        let json = serde_json::to_string(&values).unwrap();
        assert!(json.starts_with("{\"soil_moisture\":0.0,\"soil_pH\":6.5"), "{}", json);
        let back: SoilValues = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn proxy_zeroes_sensors_without_reading() {
        let scalars = DiseaseScalars {
            mean_green_intensity: 120.0,
            color_variance: 10.0,
            texture_entropy: 3.0,
            spot_area_ratio: 0.25,
            disease_color_index: 1.5,
        };
        let row = SoilValues::proxy(&scalars, None);
        for feature in SoilFeature::SENSOR {
            assert_eq!(row.get(feature), 0.0);
        }
        assert_eq!(row.get(SoilFeature::SpotAreaRatio), 0.25);

        let reading = SensorReading {
            soil_ph: 6.8,
            ..SensorReading::default()
        };
        let row = SoilValues::proxy(&scalars, Some(&reading));
        assert_eq!(row.get(SoilFeature::SoilPh), 6.8);
        assert_eq!(row.get(SoilFeature::MeanGreenIntensity), 120.0);
    }
}
