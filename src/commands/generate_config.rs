//! Generate config command implementation

use super::emit;
use anyhow::Result;
use clap::Args;
use pvs_eval::config::FallbackPolicy;
use pvs_eval::EvalConfig;
use std::path::PathBuf;

/// Arguments for the generate-config command
#[derive(Debug, Args)]
pub struct GenerateConfigArgs {
    /// Ground-truth root directory to put in the template
    #[arg(long, value_name = "DIR", default_value = "ground_truth")]
    pub ground_truth_root: PathBuf,

    /// Use central-box regions for cases without a site
    #[arg(long)]
    pub central_boxes: bool,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl GenerateConfigArgs {
    /// Execute the generate-config command
    pub fn execute(&self) -> Result<()> {
        let mut config = EvalConfig::default();
        config.layout.ground_truth_root = self.ground_truth_root.clone();
        if self.central_boxes {
            config.fallback = FallbackPolicy::CentralBoxes;
        }
        emit(&config.to_toml_string()?, self.output.as_deref())
    }
}
