//! CLI command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::Path;

pub mod batch;
pub mod clean;
pub mod evaluate;
pub mod generate_config;

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Evaluate one prediction against its ground truth
    Evaluate(evaluate::EvaluateArgs),

    /// Evaluate every submission in a directory using a config file
    Batch(batch::BatchArgs),

    /// Remove small components and/or erode a mask
    Clean(clean::CleanArgs),

    /// Print a default batch configuration
    GenerateConfig(generate_config::GenerateConfigArgs),
}

impl Commands {
    pub fn execute(&self) -> Result<()> {
        match self {
            Commands::Evaluate(args) => args.execute(),
            Commands::Batch(args) => args.execute(),
            Commands::Clean(args) => args.execute(),
            Commands::GenerateConfig(args) => args.execute(),
        }
    }
}

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One line per case
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Write `content` to `output`, or to stdout when no file is given.
pub fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, format!("{}\n", content))
            .with_context(|| format!("Failed to write to {}", path.display())),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

/// Parse a `--connectivity` rank into the library type.
pub fn connectivity_from_rank(rank: u8) -> Result<pvs_eval::Connectivity> {
    pvs_eval::Connectivity::from_rank(rank)
        .with_context(|| format!("connectivity must be 1, 2 or 3, got {}", rank))
}
