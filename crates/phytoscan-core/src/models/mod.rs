pub mod classifier_trait;
pub mod gbdt;

pub use classifier_trait::{argmax, ClassifierModel, RegressorModel};
pub use gbdt::{GBDTClassifier, GBDTRegressor};
