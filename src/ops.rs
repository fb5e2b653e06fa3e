//! Linear algebra kernels
//!
//! Pure functions over [`Matrix`]: multiplication, transpose and scalar
//! division. Inputs are never modified except by the explicitly `_in_place`
//! helpers.

use rayon::prelude::*;

use crate::{
    error::{FastlmError, Result},
    matrix::Matrix,
};

/// Multiply-add count above which matmul splits rows across threads
///
/// Each output element is still accumulated over `k` in ascending order on a
/// single thread, so the parallel and sequential paths are bit-identical.
pub const PARALLEL_MATMUL_THRESHOLD: usize = 1 << 16;

/// Matrix multiplication `C = A · B`
///
/// `C[i][j] = Σ_k A[i][k] · B[k][j]`, accumulated in `f32`.
///
/// # Errors
///
/// Returns `DimensionMismatch` if `a.cols() != b.rows()`
///
/// # Examples
///
/// ```
/// use fastlm::{ops::matmul, Matrix};
///
/// let a = Matrix::from_vec(1, 2, vec![1.0, 2.0]).unwrap();
/// let b = Matrix::from_vec(2, 1, vec![3.0, 4.0]).unwrap();
/// assert_eq!(matmul(&a, &b).unwrap().data(), &[11.0]);
/// ```
pub fn matmul(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(FastlmError::DimensionMismatch {
            operation: "matmul".to_string(),
            left: a.shape(),
            right: b.shape(),
        });
    }

    let (m, k) = a.shape();
    let n = b.cols();
    log::debug!("matmul [{m}x{k}] x [{k}x{n}]");

    let mut out = vec![0.0f32; m * n];
    let work = m * k * n;
    if work >= PARALLEL_MATMUL_THRESHOLD && m > 1 {
        out.par_chunks_mut(n)
            .zip(a.data().par_chunks(k))
            .for_each(|(out_row, a_row)| matmul_row(a_row, b, out_row));
    } else {
        for (out_row, a_row) in out.chunks_mut(n).zip(a.data().chunks(k)) {
            matmul_row(a_row, b, out_row);
        }
    }

    Ok(Matrix::from_raw(m, n, out))
}

/// One output row: `out_row = a_row · B`, i-k-j order for contiguous access
#[inline]
fn matmul_row(a_row: &[f32], b: &Matrix, out_row: &mut [f32]) {
    for (&a_ik, b_row) in a_row.iter().zip(b.iter_rows()) {
        for (c, &b_kj) in out_row.iter_mut().zip(b_row) {
            *c += a_ik * b_kj;
        }
    }
}

/// Transpose: `M'[j][i] = M[i][j]`
///
/// The result has shape `cols × rows`; the input is left untouched.
#[must_use]
pub fn transpose(m: &Matrix) -> Matrix {
    let (rows, cols) = m.shape();
    let src = m.data();
    let mut data = vec![0.0f32; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            data[j * rows + i] = src[i * cols + j];
        }
    }
    Matrix::from_raw(cols, rows, data)
}

/// Divide every element by `divisor`
pub fn scale_in_place(m: &mut Matrix, divisor: f32) {
    for v in m.data_mut() {
        *v /= divisor;
    }
}
