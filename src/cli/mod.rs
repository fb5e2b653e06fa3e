//! CLI command implementations
//!
//! The business logic behind each subcommand, kept out of `main.rs` so it can
//! be tested. Commands return `Result`; `main` decides the exit status.

use std::{path::Path, time::Instant};

use serde::Serialize;

use crate::{
    config::InferenceConfig,
    error::{FastlmError, Result},
    matrix::Matrix,
    model::{open_model, writer, LoaderLimits, Model, ModelHeader},
};

pub mod args;
pub use args::{Cli, Commands, OutputFormat};

/// Result of one timed forward pass
#[derive(Debug, Clone, Serialize)]
pub struct InferenceReport {
    /// Blocks the forward pass ran through
    pub layers: usize,
    /// `layers` value stored in the file header
    pub declared_layers: i32,
    /// Embedding dimension
    pub d_model: usize,
    /// Input rows
    pub seq_len: usize,
    /// Output matrix `[seq_len, d_model]`
    pub output: Matrix,
    /// Forward pass wall time in microseconds
    pub elapsed_us: u64,
    /// Input rows per second, absent when the pass was too fast to time
    pub tokens_per_sec: Option<f64>,
}

impl InferenceReport {
    /// Text rendering: labelled output, then timing
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut text = self.output.render("Final Output");
        text.push('\n');
        text.push_str(&format!("Inference time: {} microseconds\n", self.elapsed_us));
        match self.tokens_per_sec {
            Some(tps) => text.push_str(&format!("Speed: {tps:.1} tokens/second (approx)\n")),
            None => text.push_str("Speed: n/a (below timer resolution)\n"),
        }
        text
    }
}

/// Main CLI entrypoint - dispatches commands
///
/// # Errors
///
/// Propagates any load, inference, or I/O failure from the command
pub fn entrypoint(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            model,
            seq_len,
            fill,
            format,
            config,
            stacked,
        } => {
            let mut cfg = match config {
                Some(path) => InferenceConfig::from_file(path)?,
                None => InferenceConfig::default(),
            };
            if let Some(n) = seq_len {
                cfg = cfg.with_seq_len(n);
            }
            if let Some(v) = fill {
                cfg = cfg.with_fill_value(v);
            }
            cfg.validate()?;

            let report = run_inference(&model, &cfg, stacked)?;
            match format {
                OutputFormat::Text => print!("{}", report.render_text()),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&report).map_err(|e| FastlmError::IoError {
                        message: format!("Failed to encode report: {e}"),
                    })?
                ),
            }
            Ok(())
        },
        Commands::Export {
            path,
            d_model,
            layers,
            seed,
        } => {
            run_export(&path, layers, d_model, seed)?;
            println!("Model saved to {} (layers={layers}, d_model={d_model})", path.display());
            Ok(())
        },
        Commands::Info { model } => {
            print!("{}", run_info(&model, &LoaderLimits::default())?);
            Ok(())
        },
    }
}

/// Load `model_path`, build the constant input and time one forward pass
///
/// Loads the single block unless `stacked` is set. The model file is closed
/// before inference starts.
///
/// # Errors
///
/// Returns any load error; forward is never attempted on a failed load
pub fn run_inference(
    model_path: &Path,
    config: &InferenceConfig,
    stacked: bool,
) -> Result<InferenceReport> {
    let limits = config.loader_limits();
    let model = if stacked {
        Model::load_stacked(model_path, &limits)?
    } else {
        Model::load(model_path, &limits)?
    };
    let input = Matrix::filled(config.seq_len, model.d_model(), config.fill_value)?;

    log::info!(
        "Running inference: input [{}x{}]",
        input.rows(),
        input.cols()
    );
    let start = Instant::now();
    let output = model.forward(&input)?;
    let elapsed = start.elapsed();

    let secs = elapsed.as_secs_f64();
    #[allow(clippy::cast_precision_loss)]
    let tokens_per_sec = (secs > 0.0).then(|| config.seq_len as f64 / secs);

    Ok(InferenceReport {
        layers: model.num_layers(),
        declared_layers: model.declared_layers(),
        d_model: model.d_model(),
        seq_len: config.seq_len,
        output,
        elapsed_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        tokens_per_sec,
    })
}

/// Write a random model file
///
/// # Errors
///
/// Returns `InvalidShape` for zero dimensions, `StreamUnavailable` if the
/// file cannot be created
pub fn run_export(path: &Path, layers: usize, d_model: usize, seed: u64) -> Result<()> {
    let model = writer::random_model(layers, d_model, seed)?;
    writer::save_model(path, &model)
}

/// Describe a model file's header, its range check and whether its size matches
///
/// Sizes are computed with checked arithmetic, so any header is safe to
/// describe.
///
/// # Errors
///
/// Returns `StreamUnavailable`, `InvalidFormat` or `TruncatedFile` from the
/// header read
pub fn run_info(model_path: &Path, limits: &LoaderLimits) -> Result<String> {
    let header = {
        let mut reader = open_model(model_path)?;
        ModelHeader::read(&mut reader)?
    };
    let actual = std::fs::metadata(model_path)?.len();

    let mut text = format!("File: {}\n", model_path.display());
    text.push_str(&format!("Layers: {} (informational)\n", header.layers));
    text.push_str(&format!("d_model: {}\n", header.d_model));
    let expected = header.expected_file_size();
    let stacked = header.stacked_file_size().filter(|_| header.layers > 1);
    if let Some(expected) = expected {
        text.push_str(&format!("Expected size: {expected} bytes\n"));
    }
    if let Some(stacked) = stacked {
        text.push_str(&format!("Stacked size: {stacked} bytes\n"));
    }
    text.push_str(&format!("File size: {actual} bytes\n"));

    if let Err(e) = header.validate(limits) {
        text.push_str(&format!("Status: out of range ({e})\n"));
        return Ok(text);
    }
    match expected {
        Some(expected) if actual < expected => {
            text.push_str(&format!(
                "Status: truncated (expected {expected} bytes)\n"
            ));
        },
        Some(_) if stacked == Some(actual) => {
            text.push_str(&format!(
                "Status: complete ({} stacked blocks)\n",
                header.layers
            ));
        },
        Some(expected) if actual == expected => {
            text.push_str("Status: complete\n");
        },
        Some(expected) => {
            text.push_str(&format!(
                "Status: {} trailing bytes\n",
                actual - expected
            ));
        },
        None => text.push_str("Status: invalid dimensions\n"),
    }
    Ok(text)
}
