//! Transformer block: attention sublayer with output projection
//!
//! ```text
//! Q = x · W_q    K = x · W_k    V = x · W_v
//! y = attention(Q, K, V) · W_out
//! ```
//!
//! There is no residual connection, normalization or feed-forward sublayer.

use std::io::Read;

use rand::Rng;

use crate::{
    error::{FastlmError, Result},
    layers::Attention,
    matrix::Matrix,
    ops::matmul,
};

use super::loader::{load_weights, BlockWeights};

/// Single-head self-attention block with `d_model × d_model` weights
///
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerBlock {
    d_model: usize,
    attention: Attention,
    w_q: Matrix,
    w_k: Matrix,
    w_v: Matrix,
    w_out: Matrix,
}

impl TransformerBlock {
    /// Create a block from explicit weights
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` unless all four matrices are square and share
    /// the same size
    pub fn new(w_q: Matrix, w_k: Matrix, w_v: Matrix, w_out: Matrix) -> Result<Self> {
        let d_model = w_q.rows();
        for (name, w) in [("w_q", &w_q), ("w_k", &w_k), ("w_v", &w_v), ("w_out", &w_out)] {
            if w.shape() != (d_model, d_model) {
                return Err(FastlmError::InvalidShape {
                    reason: format!(
                        "{name} is {}x{}, expected {d_model}x{d_model}",
                        w.rows(),
                        w.cols()
                    ),
                });
            }
        }
        Ok(Self {
            d_model,
            attention: Attention::new(d_model)?,
            w_q,
            w_k,
            w_v,
            w_out,
        })
    }

    /// Create a block from loaded weights
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if the weights are not all `d × d`
    pub fn from_weights(weights: BlockWeights) -> Result<Self> {
        Self::new(weights.w_q, weights.w_k, weights.w_v, weights.w_out)
    }

    /// Load a block's weights from a stream positioned at its first tensor
    ///
    /// # Errors
    ///
    /// Returns `TruncatedFile` if the stream ends before all four tensors are
    /// read
    pub fn from_reader<R: Read>(d_model: usize, reader: &mut R) -> Result<Self> {
        Self::from_weights(load_weights(reader, d_model)?)
    }

    /// Create a block with uniform `[0, 1)` weights
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if `d_model` is zero
    pub fn random<R: Rng + ?Sized>(d_model: usize, rng: &mut R) -> Result<Self> {
        Self::new(
            Matrix::random(d_model, d_model, rng)?,
            Matrix::random(d_model, d_model, rng)?,
            Matrix::random(d_model, d_model, rng)?,
            Matrix::random(d_model, d_model, rng)?,
        )
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `input` - `[seq_len, d_model]`
    ///
    /// # Returns
    ///
    /// `[seq_len, d_model]`
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `input.cols() != d_model`
    pub fn forward(&self, input: &Matrix) -> Result<Matrix> {
        let q = matmul(input, &self.w_q)?;
        let k = matmul(input, &self.w_k)?;
        let v = matmul(input, &self.w_v)?;
        let attn_out = self.attention.forward(&q, &k, &v)?;
        matmul(&attn_out, &self.w_out)
    }

    /// Embedding dimension
    #[must_use]
    pub fn d_model(&self) -> usize {
        self.d_model
    }

    /// Attention layer sized to `d_model`
    #[must_use]
    pub fn attention(&self) -> &Attention {
        &self.attention
    }

    /// Query projection
    #[must_use]
    pub fn w_q(&self) -> &Matrix {
        &self.w_q
    }

    /// Key projection
    #[must_use]
    pub fn w_k(&self) -> &Matrix {
        &self.w_k
    }

    /// Value projection
    #[must_use]
    pub fn w_v(&self) -> &Matrix {
        &self.w_v
    }

    /// Output projection
    #[must_use]
    pub fn w_out(&self) -> &Matrix {
        &self.w_out
    }

    /// Weights in file order: Q, K, V, out
    #[must_use]
    pub fn weights(&self) -> [&Matrix; 4] {
        [&self.w_q, &self.w_k, &self.w_v, &self.w_out]
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn identity(n: usize) -> Matrix {
        let mut m = Matrix::zeros(n, n).unwrap();
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    fn identity_block(n: usize) -> TransformerBlock {
        TransformerBlock::new(identity(n), identity(n), identity(n), identity(n)).unwrap()
    }

    #[test]
    fn test_identity_block_single_token() {
        // One token: attention weight is 1, so output == V == input
        let block = identity_block(2);
        let input = Matrix::from_vec(1, 2, vec![1.0, 2.0]).unwrap();
        let out = block.forward(&input).unwrap();
        assert_eq!(out.data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_identical_tokens_pass_through() {
        // Equal rows give uniform weights over equal values
        let block = identity_block(4);
        let input = Matrix::filled(3, 4, 0.5).unwrap();
        let out = block.forward(&input).unwrap();
        assert!(out.max_abs_diff(&input).unwrap() < 1e-6);
    }

    #[test]
    fn test_output_projection_applied() {
        let scale2 = Matrix::from_vec(2, 2, vec![2.0, 0.0, 0.0, 2.0]).unwrap();
        let block = TransformerBlock::new(identity(2), identity(2), identity(2), scale2).unwrap();
        let input = Matrix::from_vec(1, 2, vec![1.0, -3.0]).unwrap();
        assert_eq!(block.forward(&input).unwrap().data(), &[2.0, -6.0]);
    }

    #[test]
    fn test_forward_shape() {
        let mut rng = StdRng::seed_from_u64(5);
        let block = TransformerBlock::random(8, &mut rng).unwrap();
        let input = Matrix::random(5, 8, &mut rng).unwrap();
        let out = block.forward(&input).unwrap();
        assert_eq!(out.shape(), (5, 8));
        assert!(out.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_forward_wrong_width() {
        let block = identity_block(4);
        let input = Matrix::zeros(2, 3).unwrap();
        assert!(matches!(
            block.forward(&input).unwrap_err(),
            FastlmError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_attention_sized_to_d_model() {
        let block = identity_block(4);
        assert_eq!(block.attention().head_dim(), 4);
        assert!((block.attention().scale() - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_forward_matches_unfused_computation() {
        let mut rng = StdRng::seed_from_u64(9);
        let block = TransformerBlock::random(6, &mut rng).unwrap();
        let input = Matrix::random(4, 6, &mut rng).unwrap();

        let q = matmul(&input, block.w_q()).unwrap();
        let k = matmul(&input, block.w_k()).unwrap();
        let v = matmul(&input, block.w_v()).unwrap();
        let expected = matmul(&crate::layers::attention(&q, &k, &v).unwrap(), block.w_out()).unwrap();

        assert_eq!(block.forward(&input).unwrap(), expected);
    }

    #[test]
    fn test_new_rejects_non_square() {
        let err = TransformerBlock::new(
            identity(2),
            identity(2),
            Matrix::zeros(2, 3).unwrap(),
            identity(2),
        )
        .unwrap_err();
        assert!(err.to_string().contains("w_v"));
    }

    #[test]
    fn test_new_rejects_mixed_sizes() {
        let result = TransformerBlock::new(identity(2), identity(3), identity(2), identity(2));
        assert!(result.is_err());
    }

    #[test]
    fn test_weights_order() {
        let block = TransformerBlock::new(
            Matrix::filled(1, 1, 1.0).unwrap(),
            Matrix::filled(1, 1, 2.0).unwrap(),
            Matrix::filled(1, 1, 3.0).unwrap(),
            Matrix::filled(1, 1, 4.0).unwrap(),
        )
        .unwrap();
        let values: Vec<f32> = block.weights().iter().map(|w| w.get(0, 0)).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(block.d_model(), 1);
        assert_eq!(block.w_q().get(0, 0), 1.0);
        assert_eq!(block.w_k().get(0, 0), 2.0);
        assert_eq!(block.w_v().get(0, 0), 3.0);
        assert_eq!(block.w_out().get(0, 0), 4.0);
    }
}
