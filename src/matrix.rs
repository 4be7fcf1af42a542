// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Dense row-major matrices and the CPU reference kernels.
//!
//! A [`Matrix`] is always rectangular: `rows` is its height and `cols` its width.
//! The CPU kernels here are the fallback path of the numeric kernels and the reference
//! the GPU path is checked against.

use std::fmt::{Debug, Formatter};
use std::ops::{Index, IndexMut};

#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Creates a `rows × cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |r, c| if r == c { 1.0 } else { 0.0 })
    }

    /// Creates a matrix whose element `(r, c)` is `f(r, c)`.
    pub fn from_fn<F: FnMut(usize, usize) -> f64>(rows: usize, cols: usize, mut f: F) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Matrix { rows, cols, data }
    }

    /// Builds a matrix from a list of rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows do not all have the same length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Self {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            assert_eq!(
                row.len(),
                cols,
                "ragged matrix: row {} has {} elements, expected {}",
                i,
                row.len(),
                cols
            );
            data.extend_from_slice(row);
        }
        Matrix {
            rows: rows.len(),
            cols,
            data,
        }
    }

    /// Wraps row-major storage.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "row-major data has {} elements, expected {}x{}",
            data.len(),
            rows,
            cols
        );
        Matrix { rows, cols, data }
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Width in texels when this matrix is uploaded (its column count).
    pub const fn width(&self) -> usize {
        self.cols
    }

    /// Height in texels when this matrix is uploaded (its row count).
    pub const fn height(&self) -> usize {
        self.rows
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    /// Compares elementwise with a tolerance relative to `max(1, |a|, |b|)`.
    ///
    /// NaNs compare equal to NaNs so that encodings can be checked end to end.
    pub fn approx_eq(&self, other: &Matrix, tolerance: f64) -> bool {
        self.max_relative_difference(other)
            .is_some_and(|diff| diff <= tolerance)
    }

    /// Largest elementwise difference scaled by `max(1, |a|, |b|)`, or `None` when the shapes differ.
    pub fn max_relative_difference(&self, other: &Matrix) -> Option<f64> {
        if self.rows != other.rows || self.cols != other.cols {
            return None;
        }
        let mut worst = 0.0f64;
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            if a.is_nan() && b.is_nan() {
                continue;
            }
            if a == b {
                continue;
            }
            let scale = 1.0f64.max(a.abs()).max(b.abs());
            let diff = (a - b).abs() / scale;
            if diff.is_nan() {
                return Some(f64::INFINITY);
            }
            worst = worst.max(diff);
        }
        Some(worst)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }
}

impl Debug for Matrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("data", &self.to_rows())
            .finish()
    }
}

impl From<Vec<Vec<f64>>> for Matrix {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Matrix::from_rows(&rows)
    }
}

/// Row-by-column product on the CPU.
///
/// Shapes are the caller's responsibility; `a.cols()` must equal `b.rows()`.
pub(crate) fn multiply_cpu(a: &Matrix, b: &Matrix) -> Matrix {
    debug_assert_eq!(a.cols, b.rows);
    let mut out = Matrix::zeros(a.rows, b.cols);
    for i in 0..a.rows {
        for j in 0..b.cols {
            let mut acc = 0.0;
            for k in 0..a.cols {
                acc += a.data[i * a.cols + k] * b.data[k * b.cols + j];
            }
            out.data[i * b.cols + j] = acc;
        }
    }
    out
}

pub(crate) fn scale_cpu(a: &Matrix, factor: f64) -> Matrix {
    Matrix {
        rows: a.rows,
        cols: a.cols,
        data: a.data.iter().map(|v| v * factor).collect(),
    }
}
