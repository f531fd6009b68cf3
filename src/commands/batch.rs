//! Batch command implementation

use super::{emit, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use pvs_eval::batch::{run_batch, CaseOutcome};
use pvs_eval::report::{format_outcomes_json, format_outcomes_text};
use pvs_eval::EvalConfig;
use std::path::PathBuf;

/// Arguments for the batch command
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Directory of participant predictions
    #[arg(short, long, value_name = "DIR")]
    pub predictions: PathBuf,

    /// Report min(1, AVD) regardless of the config
    #[arg(long)]
    pub clamp_avd: bool,

    /// Number of worker threads (0 = auto)
    #[arg(short = 'j', long, default_value_t = 0)]
    pub threads: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl BatchArgs {
    /// Execute the batch command
    pub fn execute(&self) -> Result<()> {
        let mut config = EvalConfig::load(&self.config)
            .with_context(|| format!("Failed to load config {}", self.config.display()))?;
        if self.clamp_avd {
            config.evaluation.clamp_avd = true;
        }

        if self.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build_global()
                .context("Failed to configure worker threads")?;
        }

        log::info!("Evaluating predictions in {}", self.predictions.display());
        let outcomes = run_batch(&config, &self.predictions)?;

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, CaseOutcome::Failed { .. }))
            .count();
        if failed > 0 {
            log::warn!("{} of {} cases failed", failed, outcomes.len());
        }

        let content = match self.format {
            OutputFormat::Text => format_outcomes_text(&outcomes),
            OutputFormat::Json => format_outcomes_json(&outcomes)?,
        };
        emit(&content, self.output.as_deref())
    }
}
