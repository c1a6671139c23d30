use std::error::Error;
use std::fmt;
use std::ops::Index;

#[derive(Clone, Debug, PartialEq)]
pub struct Array2<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T> Array2<T> {
    pub fn from_shape_vec(shape: (usize, usize), data: Vec<T>) -> Result<Self, ShapeError> {
        let (rows, cols) = shape;
        if data.len() != rows * cols {
            return Err(ShapeError {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Build a matrix from equally sized rows. An empty iterator yields a
    /// `0 x cols` matrix.
    pub fn from_rows<I, R>(cols: usize, rows: I) -> Result<Self, ShapeError>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[T]>,
        T: Clone,
    {
        let mut data = Vec::new();
        let mut n = 0;
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(ShapeError {
                    rows: n + 1,
                    cols,
                    len: data.len() + row.len(),
                });
            }
            data.extend_from_slice(row);
            n += 1;
        }
        Ok(Self {
            data,
            rows: n,
            cols,
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn row_slice(&self, row: usize) -> &[T] {
        let start = self.offset(row, 0);
        &self.data[start..start + self.cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.rows).map(move |r| self.row_slice(r))
    }

    pub fn column(&self, col: usize) -> Vec<T>
    where
        T: Clone,
    {
        assert!(col < self.cols, "column index out of bounds");
        (0..self.rows).map(|row| self[(row, col)].clone()).collect()
    }

    pub fn select_rows(&self, indices: &[usize]) -> Array2<T>
    where
        T: Clone,
    {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &row in indices {
            data.extend_from_slice(self.row_slice(row));
        }
        Array2 {
            data,
            rows: indices.len(),
            cols: self.cols,
        }
    }

    /// Concatenate `self` and `right` column-wise: every output row is the
    /// row of `self` followed by the row of `right`.
    pub fn hstack(&self, right: &Array2<T>) -> Result<Array2<T>, ShapeError>
    where
        T: Clone,
    {
        if self.rows != right.rows {
            return Err(ShapeError {
                rows: right.rows,
                cols: self.cols + right.cols,
                len: self.data.len() + right.data.len(),
            });
        }
        let cols = self.cols + right.cols;
        let mut data = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            data.extend_from_slice(self.row_slice(r));
            data.extend_from_slice(right.row_slice(r));
        }
        Ok(Array2 {
            data,
            rows: self.rows,
            cols,
        })
    }
}

impl<T> Index<(usize, usize)> for Array2<T> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let offset = self.offset(index.0, index.1);
        &self.data[offset]
    }
}

#[derive(Debug, Clone)]
pub struct ShapeError {
    rows: usize,
    cols: usize,
    len: usize,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid shape ({}, {}) for buffer of length {}",
            self.rows, self.cols, self.len
        )
    }
}

impl Error for ShapeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hstack_keeps_left_then_right() {
        let left = Array2::from_shape_vec((2, 2), vec![1, 2, 3, 4]).unwrap();
        let right = Array2::from_shape_vec((2, 1), vec![9, 8]).unwrap();
        let joined = left.hstack(&right).unwrap();
        assert_eq!(joined.shape(), (2, 3));
        assert_eq!(joined.row_slice(0), &[1, 2, 9]);
        assert_eq!(joined.row_slice(1), &[3, 4, 8]);
    }

    #[test]
    fn hstack_rejects_row_mismatch() {
        let left = Array2::from_shape_vec((2, 1), vec![1, 2]).unwrap();
        let right = Array2::from_shape_vec((1, 1), vec![3]).unwrap();
        assert!(left.hstack(&right).is_err());
    }

    #[test]
    fn from_rows_checks_width() {
        let ok = Array2::from_rows(2, vec![vec![1.0f32, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(ok.column(1), vec![2.0, 4.0]);
        assert!(Array2::from_rows(2, vec![vec![1.0f32]]).is_err());
    }
}
