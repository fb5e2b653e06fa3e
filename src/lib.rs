//! # fastlm
//!
//! Pure Rust forward inference for a scaled dot-product attention transformer
//! block, with weights read from a compact binary model file.
//!
//! ## Features
//!
//! - **Dense matrices**: row-major `f32` storage, shape-checked on construction
//! - **Kernels**: matmul, transpose, numerically stable softmax, attention
//! - **Model files**: `0xFEEDBEEF` header plus Q/K/V/out tensors per layer,
//!   little-endian, with truncation detected rather than under-filled
//! - **Deterministic**: random initialization always takes an explicit seed
//!
//! ## Example
//!
//! ```rust
//! use fastlm::{model::TransformerBlock, Matrix};
//!
//! let identity = || Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
//! let block = TransformerBlock::new(identity(), identity(), identity(), identity()).unwrap();
//!
//! let input = Matrix::from_vec(1, 2, vec![1.0, 2.0]).unwrap();
//! let output = block.forward(&input).unwrap();
//! assert_eq!(output.data(), &[1.0, 2.0]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Model file ──► model::header ──► model::loader ──► TransformerBlock
//!                                                        │
//! input ──► x·W_q, x·W_k, x·W_v ──► layers::attention ──► ·W_out ──► output
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::float_cmp)] // Exact comparisons in tests
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::many_single_char_names)] // q, k, v, m, n

/// CLI command implementations (extracted for testability)
pub mod cli;
/// Driver configuration loaded from JSON
pub mod config;
pub mod error;
pub mod layers;
pub mod matrix;
/// Model file format, weight loading and the transformer block
pub mod model;
pub mod ops;

pub use error::{FastlmError, Result};
pub use matrix::Matrix;
pub use model::{Model, TransformerBlock};
