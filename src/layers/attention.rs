//! Scaled dot-product attention
//!
//! ```text
//! Attention(Q, K, V) = softmax(Q @ K.T / sqrt(d_k)) @ V
//! ```
//!
//! `d_k` is the column count of `Q`. Dividing by `sqrt(d_k)` keeps the
//! softmax inputs in a well-behaved range as the embedding width grows.

use crate::{
    error::{FastlmError, Result},
    matrix::Matrix,
    ops::{matmul, scale_in_place, transpose},
};

use super::softmax_in_place;

/// Compute scaled dot-product attention
///
/// # Arguments
///
/// * `q` - Query matrix `[q_len, d_k]`
/// * `k` - Key matrix `[kv_len, d_k]`
/// * `v` - Value matrix `[kv_len, d_v]`
///
/// # Returns
///
/// Output matrix `[q_len, d_v]`
///
/// # Errors
///
/// Returns `DimensionMismatch` if `q.cols() != k.cols()` or
/// `k.rows() != v.rows()`. Shapes are checked before any work is done.
pub fn attention(q: &Matrix, k: &Matrix, v: &Matrix) -> Result<Matrix> {
    check_shapes(q, k, v)?;

    #[allow(clippy::cast_precision_loss)]
    let d_k = q.cols() as f32;
    scaled_attention(q, k, v, d_k.sqrt())
}

fn check_shapes(q: &Matrix, k: &Matrix, v: &Matrix) -> Result<()> {
    if q.cols() != k.cols() {
        return Err(FastlmError::DimensionMismatch {
            operation: "attention (query/key width)".to_string(),
            left: q.shape(),
            right: k.shape(),
        });
    }
    if k.rows() != v.rows() {
        return Err(FastlmError::DimensionMismatch {
            operation: "attention (key/value length)".to_string(),
            left: k.shape(),
            right: v.shape(),
        });
    }
    Ok(())
}

fn scaled_attention(q: &Matrix, k: &Matrix, v: &Matrix, divisor: f32) -> Result<Matrix> {
    // scores[i][j] = Q[i] . K[j]
    let mut scores = matmul(q, &transpose(k))?;
    scale_in_place(&mut scores, divisor);
    softmax_in_place(&mut scores);
    let output = matmul(&scores, v)?;

    debug_assert!(
        output.data().iter().all(|x| x.is_finite()),
        "Attention produced NaN or Inf values - check input scaling"
    );

    Ok(output)
}

/// Scaled dot-product attention with a fixed head dimension
///
/// Validates that queries have exactly `head_dim` columns and precomputes
/// `sqrt(head_dim)`, so [`Attention::forward`] is bit-identical to
/// [`attention`] for matching inputs. Each [`TransformerBlock`] owns one sized
/// to its `d_model`.
///
/// [`TransformerBlock`]: crate::model::TransformerBlock
#[derive(Debug, Clone, PartialEq)]
pub struct Attention {
    /// Head dimension (`d_k`)
    head_dim: usize,
    /// `sqrt(head_dim)`, the score divisor
    divisor: f32,
}

impl Attention {
    /// Create an attention layer for `head_dim`-wide queries and keys
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if `head_dim` is zero
    pub fn new(head_dim: usize) -> Result<Self> {
        if head_dim == 0 {
            return Err(FastlmError::InvalidShape {
                reason: "head_dim must be > 0".to_string(),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let divisor = (head_dim as f32).sqrt();

        Ok(Self { head_dim, divisor })
    }

    /// Compute attention for `q`, `k`, `v`
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `q` does not have `head_dim` columns or
    /// the shapes are otherwise incompatible
    pub fn forward(&self, q: &Matrix, k: &Matrix, v: &Matrix) -> Result<Matrix> {
        if q.cols() != self.head_dim {
            return Err(FastlmError::DimensionMismatch {
                operation: format!("attention (head_dim={})", self.head_dim),
                left: q.shape(),
                right: (q.rows(), self.head_dim),
            });
        }
        check_shapes(q, k, v)?;
        scaled_attention(q, k, v, self.divisor)
    }

    /// Head dimension
    #[must_use]
    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// Score scale factor, `1 / sqrt(head_dim)`
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.divisor.recip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attention_output_shape() {
        let q = Matrix::random_seeded(3, 4, 1).unwrap();
        let k = Matrix::random_seeded(5, 4, 2).unwrap();
        let v = Matrix::random_seeded(5, 6, 3).unwrap();
        let out = attention(&q, &k, &v).unwrap();
        assert_eq!(out.shape(), (3, 6));
    }

    #[test]
    fn test_attention_single_key_returns_value() {
        // One key: softmax of a 1-element row is 1, so every query gets V[0]
        let q = Matrix::from_vec(2, 2, vec![1.0, 2.0, -3.0, 0.5]).unwrap();
        let k = Matrix::from_vec(1, 2, vec![0.3, 0.7]).unwrap();
        let v = Matrix::from_vec(1, 3, vec![4.0, 5.0, 6.0]).unwrap();
        let out = attention(&q, &k, &v).unwrap();
        assert_eq!(out.data(), &[4.0, 5.0, 6.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_attention_hand_computed() {
        // Q = [[1, 0]], K = [[1, 0], [0, 1]], d_k = 2
        // scores = [1, 0] / sqrt(2), weights = softmax
        let q = Matrix::from_vec(1, 2, vec![1.0, 0.0]).unwrap();
        let k = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let v = Matrix::from_vec(2, 1, vec![10.0, 20.0]).unwrap();
        let out = attention(&q, &k, &v).unwrap();

        let s = 1.0f32 / 2.0f32.sqrt();
        let w0 = s.exp() / (s.exp() + 1.0);
        let expected = w0 * 10.0 + (1.0 - w0) * 20.0;
        assert!((out.get(0, 0) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_attention_uniform_when_keys_identical() {
        let q = Matrix::from_vec(1, 2, vec![0.9, -0.4]).unwrap();
        let k = Matrix::filled(3, 2, 0.5).unwrap();
        let v = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
        let out = attention(&q, &k, &v).unwrap();
        assert!((out.get(0, 0) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_attention_query_key_width_mismatch() {
        let q = Matrix::zeros(2, 3).unwrap();
        let k = Matrix::zeros(2, 4).unwrap();
        let v = Matrix::zeros(2, 4).unwrap();
        assert!(matches!(
            attention(&q, &k, &v).unwrap_err(),
            FastlmError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_attention_key_value_length_mismatch() {
        let q = Matrix::zeros(2, 4).unwrap();
        let k = Matrix::zeros(3, 4).unwrap();
        let v = Matrix::zeros(2, 4).unwrap();
        let err = attention(&q, &k, &v).unwrap_err();
        assert!(err.to_string().contains("key/value"));
    }

    #[test]
    fn test_attention_layer_matches_free_function() {
        let q = Matrix::random_seeded(3, 8, 11).unwrap();
        let k = Matrix::random_seeded(3, 8, 12).unwrap();
        let v = Matrix::random_seeded(3, 8, 13).unwrap();
        let layer = Attention::new(8).unwrap();
        let a = layer.forward(&q, &k, &v).unwrap();
        let b = attention(&q, &k, &v).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_attention_layer_zero_head_dim() {
        assert!(matches!(
            Attention::new(0).unwrap_err(),
            FastlmError::InvalidShape { .. }
        ));
    }

    #[test]
    fn test_attention_layer_wrong_head_dim() {
        let layer = Attention::new(4).unwrap();
        let q = Matrix::zeros(1, 2).unwrap();
        let k = Matrix::zeros(1, 2).unwrap();
        let v = Matrix::zeros(1, 2).unwrap();
        assert!(layer.forward(&q, &k, &v).is_err());
    }

    #[test]
    fn test_attention_layer_accessors() {
        let layer = Attention::new(16).unwrap();
        assert_eq!(layer.head_dim(), 16);
        assert!((layer.scale() - 0.25).abs() < 1e-7);
    }
}
