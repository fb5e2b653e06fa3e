//! Weight loading from model streams
//!
//! Tensors are read into an owned byte buffer of exactly the requested length
//! and decoded as little-endian `f32`. A stream that ends early is reported as
//! `TruncatedFile`; no matrix is ever returned partially filled.

use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{FastlmError, Result},
    matrix::Matrix,
};

/// Names of the per-layer weight tensors, in file order
pub const TENSOR_NAMES: [&str; 4] = ["w_q", "w_k", "w_v", "w_out"];

/// Upper bounds applied to header values before allocating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderLimits {
    /// Largest accepted `d_model`
    pub max_d_model: usize,
    /// Largest accepted layer count
    pub max_layers: usize,
}

impl Default for LoaderLimits {
    fn default() -> Self {
        Self {
            max_d_model: 8192,
            max_layers: 1024,
        }
    }
}

/// The four weight matrices of one transformer block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockWeights {
    /// Query projection
    pub w_q: Matrix,
    /// Key projection
    pub w_k: Matrix,
    /// Value projection
    pub w_v: Matrix,
    /// Output projection
    pub w_out: Matrix,
}

/// Open a model file for buffered reading
///
/// The file is closed when the returned reader is dropped.
///
/// # Errors
///
/// Returns `StreamUnavailable` if the file cannot be opened
pub fn open_model<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FastlmError::StreamUnavailable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(BufReader::new(file))
}

/// Read exactly `len` bytes
///
/// # Errors
///
/// Returns `TruncatedFile` (naming `what`) if the stream ends first, or
/// `IoError` on any other read failure
pub(crate) fn read_bytes<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FastlmError::TruncatedFile {
                    tensor: what.to_string(),
                    expected: len,
                    actual: filled,
                })
            },
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

/// Read one `rows × cols` row-major `f32` tensor
///
/// # Errors
///
/// Returns `TruncatedFile` on a short read, `InvalidShape` for a zero
/// dimension
pub fn read_matrix<R: Read>(reader: &mut R, rows: usize, cols: usize, name: &str) -> Result<Matrix> {
    if rows == 0 || cols == 0 {
        return Err(FastlmError::InvalidShape {
            reason: format!("tensor {name} has zero dimension {rows}x{cols}"),
        });
    }
    let bytes = read_bytes(reader, rows * cols * 4, name)?;
    let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let non_finite = data.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        log::warn!("tensor {name} contains {non_finite} non-finite values");
    }

    Matrix::from_vec(rows, cols, data)
}

/// Load the four `d_model × d_model` weights of a single block
///
/// Reads W_q, W_k, W_v, W_out in that order.
///
/// # Errors
///
/// Returns `TruncatedFile` if the stream holds fewer than
/// `4 · d_model² · 4` bytes
pub fn load_weights<R: Read>(reader: &mut R, d_model: usize) -> Result<BlockWeights> {
    load_layer_weights(reader, d_model, 0)
}

/// Load the weights of layer `layer`, naming tensors `layer{n}.w_q` etc.
///
/// # Errors
///
/// Returns `TruncatedFile` on a short read
pub fn load_layer_weights<R: Read>(
    reader: &mut R,
    d_model: usize,
    layer: usize,
) -> Result<BlockWeights> {
    let mut next = |name: &str| -> Result<Matrix> {
        let full = format!("layer{layer}.{name}");
        log::info!("Loading {full} [{d_model}x{d_model}]");
        read_matrix(reader, d_model, d_model, &full)
    };

    Ok(BlockWeights {
        w_q: next(TENSOR_NAMES[0])?,
        w_k: next(TENSOR_NAMES[1])?,
        w_v: next(TENSOR_NAMES[2])?,
        w_out: next(TENSOR_NAMES[3])?,
    })
}
