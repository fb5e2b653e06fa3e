//! Dense matrix implementation
//!
//! This module provides the [`Matrix`] type, a rectangular 2D container of
//! `f32` values stored contiguously in row-major order. A matrix always has at
//! least one row and one column; zero-sized matrices cannot be constructed, so
//! every kernel may assume non-empty operands.

use std::fmt::{self, Write as _};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{FastlmError, Result};

/// Dense row-major `f32` matrix
///
/// # Examples
///
/// ```
/// use fastlm::Matrix;
///
/// let m = Matrix::from_vec(2, 3, vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(m.shape(), (2, 3));
/// assert_eq!(m.get(1, 2), 6.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    /// Flattened values, `rows * cols` long
    data: Vec<f32>,
}

/// Unvalidated wire form, checked on the way in
#[derive(Deserialize)]
struct MatrixRepr {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl TryFrom<MatrixRepr> for Matrix {
    type Error = FastlmError;

    fn try_from(repr: MatrixRepr) -> Result<Self> {
        Self::from_vec(repr.rows, repr.cols, repr.data)
    }
}

impl Matrix {
    /// Create a matrix with every element set to `fill`
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if either dimension is zero
    pub fn filled(rows: usize, cols: usize, fill: f32) -> Result<Self> {
        let len = Self::check_dims(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            data: vec![fill; len],
        })
    }

    /// Create a zero-filled matrix
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if either dimension is zero
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Self::filled(rows, cols, 0.0)
    }

    /// Create a matrix from flattened row-major data
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Either dimension is zero
    /// - `data.len() != rows * cols`
    ///
    /// # Examples
    ///
    /// ```
    /// use fastlm::Matrix;
    ///
    /// let m = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(m.row(1), &[3.0, 4.0]);
    /// ```
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let len = Self::check_dims(rows, cols)?;
        if data.len() != len {
            return Err(FastlmError::DataShapeMismatch {
                data_size: data.len(),
                rows,
                cols,
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Create a matrix from nested rows
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if there are no rows, a row is empty, or the rows
    /// have different lengths
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let first = rows.first().ok_or_else(|| FastlmError::InvalidShape {
            reason: "matrix must have at least one row".to_string(),
        })?;
        let cols = first.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(FastlmError::InvalidShape {
                reason: format!("row {i} has {} columns, expected {cols}", row.len()),
            });
        }
        Self::from_vec(rows.len(), cols, rows.concat())
    }

    /// Create a matrix of independent uniform values in `[0.0, 1.0)`
    ///
    /// The random source is explicit so callers control reproducibility.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if either dimension is zero
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Self> {
        let len = Self::check_dims(rows, cols)?;
        let data = (0..len).map(|_| rng.gen::<f32>()).collect();
        Ok(Self { rows, cols, data })
    }

    /// Create a random matrix from a fixed seed
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if either dimension is zero
    pub fn random_seeded(rows: usize, cols: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::random(rows, cols, &mut rng)
    }

    /// Build from parts a kernel has already shape-checked
    pub(crate) fn from_raw(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        debug_assert!(rows > 0 && cols > 0 && data.len() == rows * cols);
        Self { rows, cols, data }
    }

    /// Element count for a valid shape
    fn check_dims(rows: usize, cols: usize) -> Result<usize> {
        if rows == 0 || cols == 0 {
            return Err(FastlmError::InvalidShape {
                reason: format!("matrix dimensions must be > 0, got {rows}x{cols}"),
            });
        }
        rows.checked_mul(cols).ok_or_else(|| FastlmError::InvalidShape {
            reason: format!("matrix {rows}x{cols} overflows the element count"),
        })
    }

    /// Number of rows
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Flattened row-major values
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flattened row-major values
    ///
    /// The length is fixed; only the values can change.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Borrow row `i`
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Iterate over rows as slices
    pub fn iter_rows(&self) -> std::slice::Chunks<'_, f32> {
        self.data.chunks(self.cols)
    }

    /// Iterate mutably over rows as slices
    pub fn iter_rows_mut(&mut self) -> std::slice::ChunksMut<'_, f32> {
        self.data.chunks_mut(self.cols)
    }

    /// Element at `(i, j)`
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        assert!(j < self.cols, "column {j} out of bounds ({})", self.cols);
        self.data[i * self.cols + j]
    }

    /// Set element at `(i, j)`
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        assert!(j < self.cols, "column {j} out of bounds ({})", self.cols);
        self.data[i * self.cols + j] = value;
    }

    /// Consume the matrix and return its flattened data
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Largest absolute elementwise difference to `other`
    ///
    /// Returns `None` when the shapes differ.
    #[must_use]
    pub fn max_abs_diff(&self, other: &Self) -> Option<f32> {
        if self.shape() != other.shape() {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max),
        )
    }

    /// Render as a labelled block with 4 decimal places
    ///
    /// ```text
    /// --- Final Output [1x2] ---
    /// [ 1.0000 2.0000 ]
    /// ```
    #[must_use]
    pub fn render(&self, label: &str) -> String {
        let mut out = format!("--- {label} [{}x{}] ---\n", self.rows, self.cols);
        for row in self.iter_rows() {
            out.push_str("[ ");
            for val in row {
                // Writing to a String cannot fail
                let _ = write!(out, "{val:.4} ");
            }
            out.push_str("]\n");
        }
        out
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix(shape=[{}, {}], data=[", self.rows, self.cols)?;
        for (i, row) in self.iter_rows().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{row:?}")?;
        }
        write!(f, "])")
    }
}
