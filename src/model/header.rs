//! Model file header
//!
//! | Offset | Size | Field   |
//! |--------|------|---------|
//! | 0      | 4    | magic (`0xFEEDBEEF`, little-endian u32) |
//! | 4      | 4    | layers (i32, informational) |
//! | 8      | 4    | d_model (i32) |
//!
//! The header is followed by four `d_model × d_model` row-major `f32` tensors
//! in the order Q, K, V, out. Stacked files repeat that group once per declared
//! layer; the default loader reads only the first group.

use std::io::{Read, Write};

use serde::Serialize;

use crate::error::{FastlmError, Result};

use super::loader::{read_bytes, LoaderLimits};

/// Model file magic number
pub const MAGIC: u32 = 0xFEED_BEEF;

/// Header size in bytes
pub const HEADER_SIZE: usize = 12;

/// Weight tensors stored per layer (Q, K, V, out)
pub const TENSORS_PER_LAYER: usize = 4;

/// Parsed model header
///
/// Values are kept exactly as stored; call [`ModelHeader::validate`] before
/// using them to size allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelHeader {
    /// Declared number of transformer layers, not validated by the default loader
    pub layers: i32,
    /// Embedding dimension
    pub d_model: i32,
}

impl ModelHeader {
    /// Create a header
    #[must_use]
    pub fn new(layers: i32, d_model: i32) -> Self {
        Self { layers, d_model }
    }

    /// Read a header from the start of a model stream
    ///
    /// The magic number is checked before anything else is consumed.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The magic number is not [`MAGIC`] (`InvalidFormat`)
    /// - The stream ends inside the header (`TruncatedFile`)
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let magic_bytes = read_bytes(reader, 4, "header.magic")?;
        let magic = u32::from_le_bytes([
            magic_bytes[0],
            magic_bytes[1],
            magic_bytes[2],
            magic_bytes[3],
        ]);
        if magic != MAGIC {
            return Err(FastlmError::InvalidFormat {
                reason: format!("bad magic 0x{magic:08X} (expected 0x{MAGIC:08X})"),
            });
        }
        log::info!("File verified (magic: 0x{magic:08X})");

        let dims = read_bytes(reader, 8, "header.dims")?;
        let layers = i32::from_le_bytes([dims[0], dims[1], dims[2], dims[3]]);
        let d_model = i32::from_le_bytes([dims[4], dims[5], dims[6], dims[7]]);
        log::info!("Model config: layers={layers}, d_model={d_model}");

        Ok(Self { layers, d_model })
    }

    /// Write the header in file order
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the writer fails
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC.to_le_bytes())?;
        writer.write_all(&self.layers.to_le_bytes())?;
        writer.write_all(&self.d_model.to_le_bytes())?;
        Ok(())
    }

    /// Check `d_model` against `limits`
    ///
    /// `layers` is informational and is not checked here; see
    /// [`ModelHeader::stacked_layers`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if `d_model` is non-positive or exceeds the
    /// configured maximum
    pub fn validate(&self, limits: &LoaderLimits) -> Result<usize> {
        positive(self.d_model, "d_model", limits.max_d_model)
    }

    /// Declared layer count as a size, for stacked loading
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if `layers` is non-positive or exceeds the
    /// configured maximum
    pub fn stacked_layers(&self, limits: &LoaderLimits) -> Result<usize> {
        positive(self.layers, "layers", limits.max_layers)
    }

    /// Bytes of one block's four tensors
    ///
    /// Returns `None` for a non-positive `d_model` or on overflow.
    #[must_use]
    pub fn block_size(&self) -> Option<u64> {
        let d_model = u64::try_from(self.d_model).ok().filter(|&d| d > 0)?;
        d_model
            .checked_mul(d_model)?
            .checked_mul(TENSORS_PER_LAYER as u64)?
            .checked_mul(4)
    }

    /// File size read by the default single-block loader: header plus one block
    ///
    /// Returns `None` for a non-positive `d_model` or on overflow.
    #[must_use]
    pub fn expected_file_size(&self) -> Option<u64> {
        self.block_size()?.checked_add(HEADER_SIZE as u64)
    }

    /// File size when every declared layer is stored: header plus `layers` blocks
    ///
    /// Returns `None` for non-positive dimensions or on overflow.
    #[must_use]
    pub fn stacked_file_size(&self) -> Option<u64> {
        let layers = u64::try_from(self.layers).ok().filter(|&l| l > 0)?;
        layers
            .checked_mul(self.block_size()?)?
            .checked_add(HEADER_SIZE as u64)
    }
}

fn positive(value: i32, field: &str, max: usize) -> Result<usize> {
    match usize::try_from(value) {
        Ok(v) if v > 0 && v <= max => Ok(v),
        _ => Err(FastlmError::InvalidFormat {
            reason: format!("{field}={value} out of range (expected 1..={max})"),
        }),
    }
}
