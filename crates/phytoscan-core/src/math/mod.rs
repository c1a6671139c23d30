//! Small row-major matrix used for feature tables.
//!
//! Rows are samples and columns are features. The type carries just enough
//! API for assembling training matrices (row selection, fixed-order
//! horizontal concatenation) and feeding rows to the tree models.
pub mod matrix;

pub use matrix::{Array2, ShapeError};
