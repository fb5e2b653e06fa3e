//! Error types for fastlm
//!
//! Every kernel, loader and driver failure is reported through [`FastlmError`].
//! All variants are fatal for the operation that produced them: a failed load
//! never yields a partially-populated model and a failed kernel never yields a
//! wrong-shape matrix.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FastlmError>;

/// Errors produced by fastlm operations
#[derive(Debug, Error)]
pub enum FastlmError {
    /// Kernel inputs have incompatible shapes
    #[error("Dimension mismatch in {operation}: {left:?} vs {right:?}")]
    DimensionMismatch {
        /// Operation that rejected its inputs
        operation: String,
        /// Shape of the left-hand operand `(rows, cols)`
        left: (usize, usize),
        /// Shape of the right-hand operand `(rows, cols)`
        right: (usize, usize),
    },

    /// Requested matrix shape is not allowed
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Why the shape was rejected
        reason: String,
    },

    /// Data length does not match the declared shape
    #[error("Data size {data_size} does not match shape {rows}x{cols}")]
    DataShapeMismatch {
        /// Number of values supplied
        data_size: usize,
        /// Declared rows
        rows: usize,
        /// Declared columns
        cols: usize,
    },

    /// Model file is not in the expected format
    #[error("Invalid model format: {reason}")]
    InvalidFormat {
        /// What was wrong with the file
        reason: String,
    },

    /// Model file could not be opened or created
    #[error("Cannot open model file {path}: {message}")]
    StreamUnavailable {
        /// Path that failed
        path: String,
        /// Underlying OS error
        message: String,
    },

    /// Stream ended before all declared bytes were read
    #[error("Truncated model file while reading {tensor}: expected {expected} bytes, got {actual}")]
    TruncatedFile {
        /// Section being read when the stream ran dry
        tensor: String,
        /// Bytes requested
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Any other I/O failure
    #[error("I/O error: {message}")]
    IoError {
        /// Error description
        message: String,
    },

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<std::io::Error> for FastlmError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
        }
    }
}
