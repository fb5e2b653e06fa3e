//! Model loading and inference
//!
//! Provides:
//! - The binary model file header ([`ModelHeader`])
//! - Weight loading from streams ([`loader`])
//! - The attention block ([`TransformerBlock`])
//! - The loaded model ([`Model`]): one block by default, or an opt-in stack
//! - Model serialization ([`writer`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use fastlm::{model::Model, Matrix};
//!
//! let model = Model::load("models/model.bin", &Default::default())?;
//! let input = Matrix::filled(3, model.d_model(), 0.5)?;
//! let output = model.forward(&input)?;
//! ```

use std::{io::Read, path::Path};

use crate::{
    error::{FastlmError, Result},
    matrix::Matrix,
};

mod block;
pub mod header;
pub mod loader;
pub mod writer;

pub use block::TransformerBlock;
pub use header::{ModelHeader, HEADER_SIZE, MAGIC};
pub use loader::{load_layer_weights, load_weights, open_model, BlockWeights, LoaderLimits};

/// Transformer blocks sharing one `d_model`
///
/// [`Model::load`] builds exactly one block from the first tensor group,
/// whatever the header's `layers` field says. [`Model::load_stacked`] reads
/// one block per declared layer and runs them in file order, each block's
/// output feeding the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    d_model: usize,
    declared_layers: i32,
    blocks: Vec<TransformerBlock>,
}

impl Model {
    /// Build a model from existing blocks
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if `blocks` is empty, the blocks disagree on
    /// `d_model`, or there are more blocks than the header can record
    pub fn from_blocks(blocks: Vec<TransformerBlock>) -> Result<Self> {
        let d_model = blocks
            .first()
            .map(TransformerBlock::d_model)
            .ok_or_else(|| FastlmError::InvalidShape {
                reason: "model needs at least one block".to_string(),
            })?;
        if let Some((i, b)) = blocks.iter().enumerate().find(|(_, b)| b.d_model() != d_model) {
            return Err(FastlmError::InvalidShape {
                reason: format!("block {i} has d_model {}, expected {d_model}", b.d_model()),
            });
        }
        let declared_layers = i32::try_from(blocks.len()).map_err(|_| FastlmError::InvalidShape {
            reason: format!("{} blocks do not fit the header field", blocks.len()),
        })?;
        Ok(Self {
            d_model,
            declared_layers,
            blocks,
        })
    }

    /// Load the single block of a model file
    ///
    /// The header's `layers` value is kept for reporting only. The file is
    /// closed before this returns, on success and on error.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The file cannot be opened (`StreamUnavailable`)
    /// - The magic number is wrong or `d_model` is out of range (`InvalidFormat`)
    /// - The file ends before the four tensors are read (`TruncatedFile`)
    pub fn load<P: AsRef<Path>>(path: P, limits: &LoaderLimits) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Opening model file {}", path.display());
        let mut reader = open_model(path)?;
        Self::from_reader(&mut reader, limits)
    }

    /// Load one block per declared layer from a model file
    ///
    /// # Errors
    ///
    /// Same as [`Model::load`], plus `InvalidFormat` if `layers` is out of
    /// range and `TruncatedFile` if any declared layer is missing
    pub fn load_stacked<P: AsRef<Path>>(path: P, limits: &LoaderLimits) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Opening stacked model file {}", path.display());
        let mut reader = open_model(path)?;
        Self::from_reader_stacked(&mut reader, limits)
    }

    /// Load the single block from a stream positioned at offset 0
    ///
    /// # Errors
    ///
    /// Same as [`Model::load`], minus `StreamUnavailable`
    pub fn from_reader<R: Read>(reader: &mut R, limits: &LoaderLimits) -> Result<Self> {
        let header = ModelHeader::read(reader)?;
        let d_model = header.validate(limits)?;

        let block = TransformerBlock::from_reader(d_model, reader)?;
        log::info!(
            "Loaded 1 block, d_model={d_model} (header declares {} layer(s))",
            header.layers
        );
        Ok(Self {
            d_model,
            declared_layers: header.layers,
            blocks: vec![block],
        })
    }

    /// Load one block per declared layer from a stream positioned at offset 0
    ///
    /// # Errors
    ///
    /// Same as [`Model::load_stacked`], minus `StreamUnavailable`
    pub fn from_reader_stacked<R: Read>(reader: &mut R, limits: &LoaderLimits) -> Result<Self> {
        let header = ModelHeader::read(reader)?;
        let d_model = header.validate(limits)?;
        let layers = header.stacked_layers(limits)?;

        let blocks = (0..layers)
            .map(|layer| {
                load_layer_weights(reader, d_model, layer).and_then(TransformerBlock::from_weights)
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("Loaded {layers} stacked layer(s), d_model={d_model}");
        Ok(Self {
            d_model,
            declared_layers: header.layers,
            blocks,
        })
    }

    /// Run the input through every block in order
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `input.cols() != d_model`
    pub fn forward(&self, input: &Matrix) -> Result<Matrix> {
        let mut hidden = self.blocks[0].forward(input)?;
        for block in &self.blocks[1..] {
            hidden = block.forward(&hidden)?;
        }
        Ok(hidden)
    }

    /// Embedding dimension
    #[must_use]
    pub fn d_model(&self) -> usize {
        self.d_model
    }

    /// Number of blocks actually held
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    /// `layers` value from the file header, as stored
    #[must_use]
    pub fn declared_layers(&self) -> i32 {
        self.declared_layers
    }

    /// Blocks in file order
    #[must_use]
    pub fn blocks(&self) -> &[TransformerBlock] {
        &self.blocks
    }

    /// Header describing the blocks this model would write
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if a dimension does not fit in an `i32`
    pub fn header(&self) -> Result<ModelHeader> {
        let to_i32 = |v: usize, field: &str| {
            i32::try_from(v).map_err(|_| FastlmError::InvalidFormat {
                reason: format!("{field}={v} does not fit the header field"),
            })
        };
        Ok(ModelHeader::new(
            to_i32(self.blocks.len(), "layers")?,
            to_i32(self.d_model, "d_model")?,
        ))
    }
}
