//! CLI argument definitions
//!
//! Kept separate from the command logic so the parser can be tested without
//! touching the filesystem.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// fastlm - attention transformer inference from binary weight files
#[derive(Debug, Parser)]
#[command(name = "fastlm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log loader progress (equivalent to RUST_LOG=info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// How `run` prints its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Labelled matrix plus timing lines
    Text,
    /// Single JSON report object
    Json,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a model and run one forward pass over a constant input
    ///
    /// Examples:
    ///   fastlm run models/model.bin
    ///   fastlm run models/model.bin --seq-len 8 --fill 0.25 --format json
    ///   fastlm run stack.bin --stacked
    Run {
        /// Path to the model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Input rows (overrides the config file)
        #[arg(short = 'n', long)]
        seq_len: Option<usize>,

        /// Value of every input element (overrides the config file)
        #[arg(short, long)]
        fill: Option<f32>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Load one block per declared layer and chain them
        #[arg(long)]
        stacked: bool,
    },
    /// Write a model file with random weights
    ///
    /// Examples:
    ///   fastlm export models/model.bin
    ///   fastlm export big.bin --d-model 64 --layers 2 --seed 7
    Export {
        /// Destination path
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Embedding dimension
        #[arg(long, default_value = "4")]
        d_model: usize,

        /// Number of blocks to write (read back with `run --stacked`)
        #[arg(long, default_value = "1")]
        layers: usize,

        /// RNG seed for the weights
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Print a model file's header without loading weights
    Info {
        /// Path to the model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,
    },
}
