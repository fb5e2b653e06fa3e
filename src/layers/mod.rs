//! Neural network layers for transformer inference
//!
//! Implements the building blocks used by the attention sublayer:
//! - Row-wise numerically stable softmax
//! - Scaled dot-product attention
//!
//! ## Example
//!
//! ```rust
//! use fastlm::{layers::softmax_in_place, Matrix};
//!
//! let mut scores = Matrix::from_vec(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
//! softmax_in_place(&mut scores);
//! let sum: f32 = scores.row(0).iter().sum();
//! assert!((sum - 1.0).abs() < 1e-5);
//! ```

use crate::matrix::Matrix;

mod attention;
pub use attention::{attention, Attention};

/// Apply softmax to every row of `m`, in place
///
/// Softmax: `y[i] = exp(x[i] - max) / sum(exp(x[j] - max))` for all j
///
/// Subtracting the row maximum before exponentiation keeps large positive
/// scores from overflowing and very negative ones from all flushing to zero;
/// the mathematical result is unchanged. A row of identical values yields the
/// uniform distribution `1 / cols`.
pub fn softmax_in_place(m: &mut Matrix) {
    for row in m.iter_rows_mut() {
        // Find max for numerical stability
        let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum_exp = 0.0f32;
        for v in row.iter_mut() {
            *v = (*v - max_val).exp();
            sum_exp += *v;
        }

        for v in row.iter_mut() {
            *v /= sum_exp;
        }
    }
}

/// Apply row-wise softmax and return a new matrix
///
/// # Examples
///
/// ```rust
/// use fastlm::{layers::softmax, Matrix};
///
/// let input = Matrix::from_vec(1, 2, vec![0.0, 0.0]).unwrap();
/// assert_eq!(softmax(&input).data(), &[0.5, 0.5]);
/// ```
#[must_use]
pub fn softmax(input: &Matrix) -> Matrix {
    let mut out = input.clone();
    softmax_in_place(&mut out);
    out
}
