//! Model file writer
//!
//! Produces files in the layout [`Model::load_stacked`](super::Model::load_stacked)
//! reads: header, then Q, K, V, out per block, all little-endian. A one-block
//! model is exactly what [`Model::load`](super::Model::load) reads.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    error::{FastlmError, Result},
    matrix::Matrix,
};

use super::{Model, TransformerBlock};

/// Write one matrix as row-major little-endian `f32`
///
/// # Errors
///
/// Returns `IoError` if the writer fails
pub fn write_matrix<W: Write>(writer: &mut W, m: &Matrix) -> Result<()> {
    let bytes: Vec<u8> = m.data().iter().flat_map(|v| v.to_le_bytes()).collect();
    writer.write_all(&bytes)?;
    Ok(())
}

/// Serialize a whole model
///
/// # Errors
///
/// Returns `IoError` if the writer fails, `InvalidFormat` if a dimension does
/// not fit the header
pub fn write_model<W: Write>(writer: &mut W, model: &Model) -> Result<()> {
    model.header()?.write(writer)?;
    for block in model.blocks() {
        for w in block.weights() {
            write_matrix(writer, w)?;
        }
    }
    Ok(())
}

/// Write a model to `path`, replacing any existing file
///
/// # Errors
///
/// Returns `StreamUnavailable` if the file cannot be created, `IoError` if
/// writing fails
pub fn save_model<P: AsRef<Path>>(path: P, model: &Model) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| FastlmError::StreamUnavailable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut writer = BufWriter::new(file);
    write_model(&mut writer, model)?;
    writer.flush()?;
    log::info!(
        "Saved {} layer(s), d_model={} to {}",
        model.num_layers(),
        model.d_model(),
        path.display()
    );
    Ok(())
}

/// Build a model with uniform `[0, 1)` weights from a seed
///
/// # Errors
///
/// Returns `InvalidShape` if `layers` or `d_model` is zero
pub fn random_model(layers: usize, d_model: usize, seed: u64) -> Result<Model> {
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks = (0..layers)
        .map(|_| TransformerBlock::random(d_model, &mut rng))
        .collect::<Result<Vec<_>>>()?;
    Model::from_blocks(blocks)
}
