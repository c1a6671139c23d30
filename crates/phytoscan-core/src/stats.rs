/// Fraction of positions where `predicted` equals `truth`.
///
/// Returns `None` for empty input or when the lengths differ.
pub fn accuracy(predicted: &[usize], truth: &[usize]) -> Option<f64> {
    if truth.is_empty() || predicted.len() != truth.len() {
        return None;
    }
    let correct = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    Some(correct as f64 / truth.len() as f64)
}

/// Root mean squared error.
///
/// Returns `None` for empty input or when the lengths differ.
pub fn rmse(predicted: &[f32], truth: &[f32]) -> Option<f64> {
    if truth.is_empty() || predicted.len() != truth.len() {
        return None;
    }
    let mse = predicted
        .iter()
        .zip(truth)
        .map(|(&p, &t)| {
            let d = p as f64 - t as f64;
            d * d
        })
        .sum::<f64>()
        / truth.len() as f64;
    Some(mse.sqrt())
}
