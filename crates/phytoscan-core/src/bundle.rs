//! Model store: the fitted classifier, both scalers, the label encoder and
//! the per-attribute regressors travel together as one [`FittedModel`].
//!
//! On disk a bundle is a directory holding five JSON artifacts plus a
//! manifest. Every artifact is stamped with the bundle id of the training
//! run that produced it, and loading refuses a directory whose artifacts
//! are missing, unreadable or stamped by different runs.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{PhytoError, Result};
use crate::features::{image_column_names, COMBINED_LEN};
use crate::math::Array2;
use crate::models::{ClassifierModel, GBDTClassifier, GBDTRegressor, RegressorModel};
use crate::preprocessing::{LabelEncoder, StandardScaler};
use crate::soil::{SoilFeature, SoilValues, NUM_SOIL_FEATURES};

pub const FORMAT_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const TABULAR_SCALER_FILE: &str = "tabular_scaler.json";
pub const IMAGE_SCALER_FILE: &str = "image_scaler.json";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";
pub const REGRESSORS_FILE: &str = "regressors.json";

/// The five artifacts of a bundle, in save order.
pub const ARTIFACT_FILES: [&str; 5] = [
    CLASSIFIER_FILE,
    TABULAR_SCALER_FILE,
    IMAGE_SCALER_FILE,
    LABEL_ENCODER_FILE,
    REGRESSORS_FILE,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub bundle_id: String,
    pub created_at: DateTime<Utc>,
    pub classes: Vec<String>,
    pub artifacts: Vec<String>,
}

#[derive(Serialize)]
struct ArtifactRef<'a, T> {
    bundle_id: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Artifact<T> {
    bundle_id: String,
    payload: T,
}

#[derive(Serialize, Deserialize)]
struct NamedRegressor {
    attribute: String,
    model: GBDTRegressor,
}

/// One regressor per soil column, in canonical column order.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoilRegressors(Vec<NamedRegressor>);

impl SoilRegressors {
    /// `models` must be given in [`SoilFeature::ALL`] order.
    pub fn new(models: Vec<GBDTRegressor>) -> Result<Self> {
        if models.len() != NUM_SOIL_FEATURES {
            return Err(PhytoError::Configuration(format!(
                "expected {} soil regressors, got {}",
                NUM_SOIL_FEATURES,
                models.len()
            )));
        }
        Ok(SoilRegressors(
            SoilFeature::ALL
                .iter()
                .zip(models)
                .map(|(f, model)| NamedRegressor {
                    attribute: f.name().to_string(),
                    model,
                })
                .collect(),
        ))
    }

    pub fn get(&self, feature: SoilFeature) -> &GBDTRegressor {
        &self.0[feature.index()].model
    }

    /// Run every regressor on one scaled tabular row.
    pub fn predict_row(&self, scaled_row: &[f32]) -> Result<SoilValues> {
        let x = Array2::from_shape_vec((1, scaled_row.len()), scaled_row.to_vec())
            .map_err(|e| PhytoError::Configuration(e.to_string()))?;
        let mut values = SoilValues::default();
        for feature in SoilFeature::ALL {
            let prediction = self.get(feature).predict(&x)?;
            values.set(feature, prediction[0]);
        }
        Ok(values)
    }

    fn check(&self) -> Result<()> {
        if self.0.len() != NUM_SOIL_FEATURES {
            return Err(PhytoError::ModelNotLoaded(format!(
                "bundle holds {} soil regressors, expected {}",
                self.0.len(),
                NUM_SOIL_FEATURES
            )));
        }
        for (feature, named) in SoilFeature::ALL.iter().zip(&self.0) {
            if named.attribute != feature.name() {
                return Err(PhytoError::ModelNotLoaded(format!(
                    "regressor '{}' found where '{}' was expected",
                    named.attribute,
                    feature.name()
                )));
            }
            if named.model.n_features() != Some(NUM_SOIL_FEATURES) {
                return Err(PhytoError::ModelNotLoaded(format!(
                    "regressor '{}' is not fitted on {} tabular inputs",
                    named.attribute, NUM_SOIL_FEATURES
                )));
            }
        }
        Ok(())
    }
}

/// Everything a prediction needs, produced by one training run.
pub struct FittedModel {
    pub manifest: BundleManifest,
    pub classifier: GBDTClassifier,
    pub tabular_scaler: StandardScaler,
    pub image_scaler: StandardScaler,
    pub label_encoder: LabelEncoder,
    pub regressors: SoilRegressors,
}

impl FittedModel {
    /// Bundle freshly fitted artifacts under a new bundle id.
    pub fn new(
        classifier: GBDTClassifier,
        tabular_scaler: StandardScaler,
        image_scaler: StandardScaler,
        label_encoder: LabelEncoder,
        regressors: SoilRegressors,
    ) -> Result<Self> {
        let created_at = Utc::now();
        let manifest = BundleManifest {
            format_version: FORMAT_VERSION,
            bundle_id: format!(
                "{}-{:016x}",
                created_at.format("%Y%m%dT%H%M%S"),
                rand::random::<u64>()
            ),
            created_at,
            classes: label_encoder.classes().to_vec(),
            artifacts: ARTIFACT_FILES.iter().map(|s| s.to_string()).collect(),
        };
        let model = FittedModel {
            manifest,
            classifier,
            tabular_scaler,
            image_scaler,
            label_encoder,
            regressors,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn bundle_id(&self) -> &str {
        &self.manifest.bundle_id
    }

    pub fn classes(&self) -> &[String] {
        self.label_encoder.classes()
    }

    /// Check that the five artifacts fit together.
    pub fn validate(&self) -> Result<()> {
        if self.tabular_scaler.columns != SoilFeature::names() {
            return Err(PhytoError::ModelNotLoaded(
                "tabular scaler columns do not match the soil column order".to_string(),
            ));
        }
        if self.image_scaler.columns != image_column_names() {
            return Err(PhytoError::ModelNotLoaded(
                "image scaler columns do not match the descriptor layout".to_string(),
            ));
        }
        if !self.classifier.is_fitted() || self.classifier.n_features() != COMBINED_LEN {
            return Err(PhytoError::ModelNotLoaded(format!(
                "classifier is not fitted on {} combined features",
                COMBINED_LEN
            )));
        }
        if self.classifier.n_classes() != self.label_encoder.n_classes() {
            return Err(PhytoError::ModelNotLoaded(format!(
                "classifier has {} classes but the label encoder has {}",
                self.classifier.n_classes(),
                self.label_encoder.n_classes()
            )));
        }
        if self.manifest.classes != self.label_encoder.classes() {
            return Err(PhytoError::ModelNotLoaded(
                "manifest class list differs from the label encoder".to_string(),
            ));
        }
        self.regressors.check()
    }

    /// Write the bundle into `dir`. Every artifact and the manifest are
    /// staged to temporary files before anything is replaced, and the
    /// manifest is renamed last, so an interrupted save never leaves a
    /// loadable mixture behind. On failure the staged files are removed; a
    /// failure while staging leaves the previous bundle untouched.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let result = self.stage_and_commit(dir);
        if result.is_err() {
            discard_staged(dir);
        }
        result?;

        log::info!("Model bundle {} saved to {:?}", self.bundle_id(), dir);
        Ok(())
    }

    fn stage_and_commit(&self, dir: &Path) -> Result<()> {
        let id = self.bundle_id();
        let staged = vec![
            stage(dir, CLASSIFIER_FILE, id, &self.classifier)?,
            stage(dir, TABULAR_SCALER_FILE, id, &self.tabular_scaler)?,
            stage(dir, IMAGE_SCALER_FILE, id, &self.image_scaler)?,
            stage(dir, LABEL_ENCODER_FILE, id, &self.label_encoder)?,
            stage(dir, REGRESSORS_FILE, id, &self.regressors)?,
        ];
        let (manifest_tmp, manifest_path) = stage_json(dir, MANIFEST_FILE, &self.manifest)?;

        if manifest_path.exists() {
            fs::remove_file(&manifest_path)?;
        }
        for (tmp, target) in staged {
            fs::rename(&tmp, &target)?;
        }
        fs::rename(manifest_tmp, manifest_path)?;
        Ok(())
    }

    /// Load a bundle written by [`FittedModel::save`].
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PhytoError::ModelNotLoaded(format!(
                "model directory {:?} does not exist",
                dir
            )));
        }

        let manifest: BundleManifest = read_json(dir, MANIFEST_FILE)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(PhytoError::ModelNotLoaded(format!(
                "bundle format version {} is not supported (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        for name in ARTIFACT_FILES {
            if !dir.join(name).is_file() {
                return Err(PhytoError::ModelNotLoaded(format!(
                    "artifact {} is missing from {:?}",
                    name, dir
                )));
            }
        }

        let id = manifest.bundle_id.as_str();
        let model = FittedModel {
            classifier: read_artifact(dir, CLASSIFIER_FILE, id)?,
            tabular_scaler: read_artifact(dir, TABULAR_SCALER_FILE, id)?,
            image_scaler: read_artifact(dir, IMAGE_SCALER_FILE, id)?,
            label_encoder: read_artifact(dir, LABEL_ENCODER_FILE, id)?,
            regressors: read_artifact(dir, REGRESSORS_FILE, id)?,
            manifest,
        };
        model.validate()?;
        log::debug!("Loaded model bundle {} from {:?}", model.bundle_id(), dir);
        Ok(model)
    }
}

fn stage<T: Serialize>(
    dir: &Path,
    name: &str,
    bundle_id: &str,
    payload: &T,
) -> Result<(PathBuf, PathBuf)> {
    stage_json(dir, name, &ArtifactRef { bundle_id, payload })
}

/// Best-effort removal of `*.tmp` files left by an aborted save.
fn discard_staged(dir: &Path) {
    for name in ARTIFACT_FILES.iter().chain(std::iter::once(&MANIFEST_FILE)) {
        let tmp = dir.join(format!("{}.tmp", name));
        if tmp.is_file() {
            if let Err(e) = fs::remove_file(&tmp) {
                log::warn!("Failed to remove staged file {:?}: {}", tmp, e);
            } else {
                log::debug!("Removed staged file {:?}", tmp);
            }
        }
    }
}

fn stage_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<(PathBuf, PathBuf)> {
    let target = dir.join(name);
    let tmp = dir.join(format!("{}.tmp", name));
    let mut writer = BufWriter::new(File::create(&tmp)?);
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| PhytoError::Io(format!("failed to serialize {}: {}", name, e)))?;
    writer.flush()?;
    log::trace!("Staged {:?}", tmp);
    Ok((tmp, target))
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let file = File::open(&path).map_err(|e| {
        PhytoError::ModelNotLoaded(format!("cannot open {:?}: {}", path, e))
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| PhytoError::ModelNotLoaded(format!("{} is unreadable: {}", name, e)))
}

fn read_artifact<T: DeserializeOwned>(dir: &Path, name: &str, bundle_id: &str) -> Result<T> {
    let artifact: Artifact<T> = read_json(dir, name)?;
    if artifact.bundle_id != bundle_id {
        return Err(PhytoError::ModelNotLoaded(format!(
            "{} belongs to bundle {}, expected {}",
            name, artifact.bundle_id, bundle_id
        )));
    }
    Ok(artifact.payload)
}

/// A bundle loaded on first use and then shared read-only.
///
/// Concurrent first callers block until a single load completes; a failed
/// load leaves the cell empty so a later call retries.
pub struct LazyModel {
    dir: PathBuf,
    cell: OnceCell<Arc<FittedModel>>,
}

impl LazyModel {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        LazyModel {
            dir: dir.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<FittedModel>> {
        self.cell
            .get_or_try_init(|| {
                log::info!("Loading model bundle from {:?}", self.dir);
                FittedModel::load(&self.dir).map(Arc::new)
            })
            .map(Arc::clone)
    }
}

static SHARED_MODEL: OnceCell<LazyModel> = OnceCell::new();

/// Process-wide bundle, bound to the directory of the first call.
pub fn shared_model<P: AsRef<Path>>(dir: P) -> Result<Arc<FittedModel>> {
    let dir = dir.as_ref();
    let lazy = SHARED_MODEL.get_or_init(|| LazyModel::new(dir));
    if lazy.dir() != dir {
        return Err(PhytoError::Configuration(format!(
            "shared model is bound to {:?}, requested {:?}",
            lazy.dir(),
            dir
        )));
    }
    lazy.get()
}
