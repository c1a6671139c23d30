//! Tabular encoding shared by the trainer and the predictor.
//!
//! Provides a named-column standard scaler (per-column mean/std frozen at
//! fit time) and a label encoder mapping class names to small integers in
//! alphabetical order. Both refuse to handle columns or labels they were not
//! fitted on.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{PhytoError, Result};
use crate::math::Array2;

/// Standard scaler (per-column mean/std) over named columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl StandardScaler {
    /// Columns with a smaller stddev are only centred, not rescaled.
    const MIN_STD: f64 = 1e-6;

    /// Fit on `x`, whose columns are named by `columns`.
    pub fn fit(columns: Vec<String>, x: &Array2<f32>) -> Result<Self> {
        let (nrows, ncols) = x.shape();
        if ncols != columns.len() {
            return Err(PhytoError::Configuration(format!(
                "scaler given {} column names for a matrix with {} columns",
                columns.len(),
                ncols
            )));
        }
        if nrows == 0 {
            return Err(PhytoError::InsufficientData(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let n = nrows as f64;
        let mut mean = vec![0.0f64; ncols];
        for row in x.rows() {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v as f64;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut var = vec![0.0f64; ncols];
        for row in x.rows() {
            for c in 0..ncols {
                let d = row[c] as f64 - mean[c];
                var[c] += d * d;
            }
        }
        let std = var
            .iter()
            .map(|v| {
                let s = (v / n).sqrt();
                if s < Self::MIN_STD {
                    1.0
                } else {
                    s as f32
                }
            })
            .collect();

        Ok(StandardScaler {
            columns,
            mean: mean.into_iter().map(|m| m as f32).collect(),
            std,
        })
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Scale a row already laid out in fitted column order.
    pub fn transform_row(&self, row: &[f32]) -> Result<Vec<f32>> {
        if row.len() != self.n_features() {
            return Err(PhytoError::Configuration(format!(
                "scaler fitted on {} columns, got a row of {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect())
    }

    /// Scale every row of `x` (fitted column order).
    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let rows = x
            .rows()
            .map(|row| self.transform_row(row))
            .collect::<Result<Vec<_>>>()?;
        Array2::from_rows(self.n_features(), rows)
            .map_err(|e| PhytoError::Configuration(e.to_string()))
    }

    /// Scale a matrix whose columns are named by `columns`. The output is in
    /// fitted column order regardless of the input order. Unknown or missing
    /// columns are rejected.
    pub fn transform_named<S: AsRef<str>>(
        &self,
        columns: &[S],
        x: &Array2<f32>,
    ) -> Result<Array2<f32>> {
        if columns.len() != x.ncols() {
            return Err(PhytoError::Configuration(format!(
                "{} column names for a matrix with {} columns",
                columns.len(),
                x.ncols()
            )));
        }
        let position: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_ref(), i))
            .collect();
        for c in columns {
            if !self.columns.iter().any(|f| f == c.as_ref()) {
                return Err(PhytoError::Configuration(format!(
                    "column '{}' was not seen when the scaler was fitted",
                    c.as_ref()
                )));
            }
        }
        let order = self
            .columns
            .iter()
            .map(|f| {
                position.get(f.as_str()).copied().ok_or_else(|| {
                    PhytoError::Configuration(format!("fitted column '{}' is missing", f))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = x
            .rows()
            .map(|row| {
                let ordered: Vec<f32> = order.iter().map(|&i| row[i]).collect();
                self.transform_row(&ordered)
            })
            .collect::<Result<Vec<_>>>()?;
        Array2::from_rows(self.n_features(), rows)
            .map_err(|e| PhytoError::Configuration(e.to_string()))
    }
}

/// Bijective mapping between class names and codes `0..n_classes`, codes
/// assigned in alphabetical order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        if labels.is_empty() {
            return Err(PhytoError::InsufficientData(
                "cannot fit a label encoder on zero labels".to_string(),
            ));
        }
        let classes: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        Ok(LabelEncoder {
            classes: classes.into_iter().map(String::from).collect(),
        })
    }

    pub fn fit_transform<S: AsRef<str>>(labels: &[S]) -> Result<(Self, Vec<usize>)> {
        let encoder = Self::fit(labels)?;
        let codes = encoder.encode_labels(labels)?;
        Ok((encoder, codes))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode_label(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| PhytoError::Configuration(format!("unknown label '{}'", label)))
    }

    pub fn encode_labels<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode_label(l.as_ref())).collect()
    }

    pub fn decode_label(&self, code: usize) -> Result<&str> {
        self.classes.get(code).map(String::as_str).ok_or_else(|| {
            PhytoError::Configuration(format!(
                "label code {} out of range for {} classes",
                code,
                self.classes.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{}", i)).collect()
    }

    #[test]
    fn constant_column_is_only_centred() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 5.0, 2.0, 5.0, 3.0, 5.0]).unwrap();
        let sc = StandardScaler::fit(names(2), &x).unwrap();
        assert_eq!(sc.std[1], 1.0);
        let t = sc.transform(&x).unwrap();
        assert!(t.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn named_transform_reorders_into_fitted_order() {
        let x = Array2::from_shape_vec((2, 2), vec![0.0, 10.0, 2.0, 30.0]).unwrap();
        let sc = StandardScaler::fit(vec!["a".into(), "b".into()], &x).unwrap();
        let swapped = Array2::from_shape_vec((1, 2), vec![20.0, 1.0]).unwrap();
        let t = sc.transform_named(&["b", "a"], &swapped).unwrap();
        assert!(t[(0, 0)].abs() < 1e-6);
        assert!(t[(0, 1)].abs() < 1e-6);
    }

    #[test]
    fn unseen_column_is_configuration_error() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let sc = StandardScaler::fit(vec!["a".into()], &x).unwrap();
        let err = sc.transform_named(&["z"], &x).unwrap_err();
        assert!(matches!(err, PhytoError::Configuration(_)));
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn wrong_row_width_is_configuration_error() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let sc = StandardScaler::fit(vec!["a".into()], &x).unwrap();
        assert!(matches!(
            sc.transform_row(&[1.0, 2.0]),
            Err(PhytoError::Configuration(_))
        ));
    }

    #[test]
    fn labels_are_alphabetical() {
        let (enc, codes) =
            LabelEncoder::fit_transform(&["rust", "blight", "healthy", "blight"]).unwrap();
        assert_eq!(enc.classes(), &["blight", "healthy", "rust"]);
        assert_eq!(codes, vec![2, 0, 1, 0]);
        assert_eq!(enc.decode_label(1).unwrap(), "healthy");
    }

    #[test]
    fn out_of_range_code_and_unknown_label_fail() {
        let enc = LabelEncoder::fit(&["a", "b"]).unwrap();
        assert!(matches!(enc.decode_label(2), Err(PhytoError::Configuration(_))));
        assert!(matches!(enc.encode_label("c"), Err(PhytoError::Configuration(_))));
    }
}
