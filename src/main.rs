//! fastlm CLI - attention transformer inference
//!
//! # Commands
//!
//! - `run` - Load a model file and run one timed forward pass
//! - `export` - Write a model file with seeded random weights
//! - `info` - Show a model file's header

use clap::Parser;
use fastlm::cli::{entrypoint, Cli};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    if let Err(e) = entrypoint(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
