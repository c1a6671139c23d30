use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use crate::config::GbdtParams;
use crate::error::{PhytoError, Result};
use crate::math::Array2;
use crate::models::classifier_trait::{ClassifierModel, RegressorModel};

const CLASSIFIER_LOSS: &str = "LogLikelyhood";
const REGRESSOR_LOSS: &str = "SquaredError";

fn build_config(params: &GbdtParams, feature_size: usize, loss: &str) -> Config {
    let mut config = Config::new();

    config.set_feature_size(feature_size);
    config.set_shrinkage(params.learning_rate);
    config.set_max_depth(params.max_depth);
    config.set_iterations(params.num_boost_round as usize);
    config.set_min_leaf_size(params.min_leaf_size);
    config.set_data_sample_ratio(params.data_sample_ratio);
    config.set_debug(params.debug);
    config.set_training_optimization_level(params.training_optimization_level);
    config.set_loss(loss);

    config
}

fn training_data<F>(x: &Array2<f32>, label: F) -> DataVec
where
    F: Fn(usize) -> f32,
{
    let mut train_x = DataVec::new();
    for (i, row) in x.rows().enumerate() {
        train_x.push(Data::new_training_data(row.to_vec(), 1.0, label(i), None));
    }
    train_x
}

fn check_width(expected: usize, x: &Array2<f32>) -> Result<()> {
    if x.ncols() != expected {
        return Err(PhytoError::Configuration(format!(
            "model expects {} features, got {}",
            expected,
            x.ncols()
        )));
    }
    Ok(())
}

/// Gradient boosted decision tree classifier.
///
/// Multi-class problems are handled one-vs-rest: one binary log-likelihood
/// ensemble per class, whose scores are normalised into a distribution.
#[derive(Serialize, Deserialize)]
pub struct GBDTClassifier {
    params: GbdtParams,
    n_features: usize,
    models: Vec<GBDT>,
}

impl GBDTClassifier {
    pub fn new(params: GbdtParams) -> Self {
        GBDTClassifier {
            params,
            n_features: 0,
            models: Vec::new(),
        }
    }

    pub fn params(&self) -> &GbdtParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.models.is_empty()
    }
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()> {
        if n_classes < 2 {
            return Err(PhytoError::InsufficientData(format!(
                "classifier needs at least 2 classes, got {}",
                n_classes
            )));
        }
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(PhytoError::InsufficientData(format!(
                "classifier given {} rows and {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let feature_size = x.ncols();
        let config = build_config(&self.params, feature_size, CLASSIFIER_LOSS);

        let mut models = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            // the log-likelihood loss expects labels in {-1, 1}
            let mut train_x = training_data(x, |i| if y[i] == class { 1.0 } else { -1.0 });
            let mut gbdt = GBDT::new(&config);
            gbdt.fit(&mut train_x);
            log::trace!("Fitted one-vs-rest ensemble for class {}", class);
            models.push(gbdt);
        }

        self.n_features = feature_size;
        self.models = models;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if !self.is_fitted() {
            return Err(PhytoError::ModelNotLoaded(
                "classifier has not been fitted".to_string(),
            ));
        }
        check_width(self.n_features, x)?;

        let test_x = training_data(x, |_| 0.0);
        let scores: Vec<Vec<f32>> = self
            .models
            .iter()
            .map(|model| model.predict(&test_x))
            .collect();

        let k = self.models.len();
        let mut out = Vec::with_capacity(x.nrows() * k);
        for row in 0..x.nrows() {
            let raw: Vec<f32> = scores
                .iter()
                .map(|s| {
                    let v = s[row];
                    if v.is_finite() {
                        v.clamp(0.0, 1.0)
                    } else {
                        0.0
                    }
                })
                .collect();
            let total: f32 = raw.iter().sum();
            if total > 0.0 {
                out.extend(raw.iter().map(|v| v / total));
            } else {
                out.extend(std::iter::repeat(1.0 / k as f32).take(k));
            }
        }

        Array2::from_shape_vec((x.nrows(), k), out)
            .map_err(|e| PhytoError::Configuration(e.to_string()))
    }

    fn n_classes(&self) -> usize {
        self.models.len()
    }

    fn name(&self) -> &str {
        "gbdt-classifier"
    }
}

/// Gradient boosted decision tree regressor with squared-error loss.
#[derive(Serialize, Deserialize)]
pub struct GBDTRegressor {
    params: GbdtParams,
    n_features: usize,
    model: Option<GBDT>,
}

impl GBDTRegressor {
    pub fn new(params: GbdtParams) -> Self {
        GBDTRegressor {
            params,
            n_features: 0,
            model: None,
        }
    }
}

impl RegressorModel for GBDTRegressor {
    fn fit(&mut self, x: &Array2<f32>, y: &[f32]) -> Result<()> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(PhytoError::InsufficientData(format!(
                "regressor given {} rows and {} targets",
                x.nrows(),
                y.len()
            )));
        }
        let feature_size = x.ncols();
        let config = build_config(&self.params, feature_size, REGRESSOR_LOSS);

        let mut train_x = training_data(x, |i| y[i]);
        let mut gbdt = GBDT::new(&config);
        gbdt.fit(&mut train_x);

        self.n_features = feature_size;
        self.model = Some(gbdt);
        Ok(())
    }

    fn predict(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        let model = self.model.as_ref().ok_or_else(|| {
            PhytoError::ModelNotLoaded("regressor has not been fitted".to_string())
        })?;
        check_width(self.n_features, x)?;
        Ok(model.predict(&training_data(x, |_| 0.0)))
    }

    fn n_features(&self) -> Option<usize> {
        self.model.as_ref().map(|_| self.n_features)
    }

    fn name(&self) -> &str {
        "gbdt-regressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> GbdtParams {
        GbdtParams {
            learning_rate: 0.3,
            max_depth: 3,
            num_boost_round: 10,
            min_leaf_size: 1,
            data_sample_ratio: 1.0,
            training_optimization_level: 2,
            debug: false,
        }
    }

    fn three_clusters() -> (Array2<f32>, Vec<usize>) {
        let mut data = Vec::new();
        let mut y = Vec::new();
        for class in 0..3usize {
            for i in 0..6 {
                data.push(class as f32 * 10.0 + i as f32 * 0.1);
                data.push(i as f32);
                y.push(class);
            }
        }
        (Array2::from_shape_vec((18, 2), data).unwrap(), y)
    }

    #[test]
    fn classifier_rows_are_distributions() {
        let (x, y) = three_clusters();
        let mut clf = GBDTClassifier::new(small_params());
        clf.fit(&x, &y, 3).unwrap();
        assert_eq!(clf.n_classes(), 3);

        let proba = clf.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), (18, 3));
        for row in proba.rows() {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "row sums to {}", sum);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }

        let predicted = clf.predict(&x).unwrap();
        let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 15, "only {} of 18 training rows recovered", correct);
    }

    #[test]
    fn classifier_needs_two_classes() {
        let (x, _) = three_clusters();
        let mut clf = GBDTClassifier::new(small_params());
        let err = clf.fit(&x, &vec![0; 18], 1).unwrap_err();
        assert!(matches!(err, PhytoError::InsufficientData(_)));
    }

    #[test]
    fn unfitted_models_report_not_loaded() {
        let x = Array2::from_shape_vec((1, 2), vec![0.0, 0.0]).unwrap();
        let clf = GBDTClassifier::new(small_params());
        assert!(matches!(clf.predict_proba(&x), Err(PhytoError::ModelNotLoaded(_))));
        let reg = GBDTRegressor::new(small_params());
        assert!(matches!(reg.predict(&x), Err(PhytoError::ModelNotLoaded(_))));
        assert_eq!(reg.n_features(), None);
    }

    #[test]
    fn regressor_tracks_linear_target() {
        let x: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let y: Vec<f32> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let x = Array2::from_shape_vec((20, 1), x).unwrap();

        let mut reg = GBDTRegressor::new(small_params());
        reg.fit(&x, &y).unwrap();
        assert_eq!(reg.n_features(), Some(1));

        let pred = reg.predict(&x).unwrap();
        let mse: f32 = pred.iter().zip(&y).map(|(p, t)| (p - t).powi(2)).sum::<f32>() / 20.0;
        let var: f32 = {
            let mean = y.iter().sum::<f32>() / 20.0;
            y.iter().map(|t| (t - mean).powi(2)).sum::<f32>() / 20.0
        };
        assert!(mse < var, "mse {} not below target variance {}", mse, var);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let x: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let y = x.clone();
        let x = Array2::from_shape_vec((10, 1), x).unwrap();
        let mut reg = GBDTRegressor::new(small_params());
        reg.fit(&x, &y).unwrap();
        let wide = Array2::from_shape_vec((1, 2), vec![0.0, 0.0]).unwrap();
        assert!(matches!(reg.predict(&wide), Err(PhytoError::Configuration(_))));
    }
}
