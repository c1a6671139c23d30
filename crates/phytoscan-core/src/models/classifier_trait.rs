use crate::error::Result;
use crate::math::Array2;

/// Multi-class classifier contract used by the trainer and the predictor.
pub trait ClassifierModel {
    /// Fit on rows of `x` with class codes `y` in `0..n_classes`.
    fn fit(&mut self, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()>;

    /// Class probabilities, one row per sample and one column per class code.
    /// Every row sums to 1.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>>;

    /// Most probable class code per row. Ties resolve to the lowest code.
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().map(argmax).collect())
    }

    fn n_classes(&self) -> usize;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Single-target regressor contract.
pub trait RegressorModel {
    fn fit(&mut self, x: &Array2<f32>, y: &[f32]) -> Result<()>;

    fn predict(&self, x: &Array2<f32>) -> Result<Vec<f32>>;

    /// Input width fixed at fit time, `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    fn name(&self) -> &str {
        "regressor"
    }
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
