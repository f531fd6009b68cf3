//! Evaluate command implementation

use super::{connectivity_from_rank, emit, OutputFormat};
use anyhow::{bail, Context, Result};
use clap::Args;
use pvs_eval::evaluator::{evaluate, evaluate_regions, EvaluationOptions};
use pvs_eval::nifti::{load_intensities, load_volume};
use pvs_eval::report::{format_case_line, format_metrics};
use pvs_eval::types::RegionMetrics;
use pvs_eval::RegionMask;
use std::path::PathBuf;

/// Arguments for the evaluate command
#[derive(Debug, Args)]
pub struct EvaluateArgs {
    /// Predicted mask (NIfTI)
    #[arg(short, long, value_name = "FILE")]
    pub prediction: PathBuf,

    /// Ground-truth mask (NIfTI)
    #[arg(short, long, value_name = "FILE")]
    pub ground_truth: PathBuf,

    /// Restrict evaluation to an atlas region; repeatable
    #[arg(short, long, value_name = "NAME=FILE")]
    pub region: Vec<String>,

    /// Atlas voxels above this value are inside the region
    #[arg(long, default_value_t = 0.5, value_name = "VALUE")]
    pub region_threshold: f64,

    /// Connectivity rank for instance labeling (1 = 6, 2 = 18, 3 = 26 neighbours)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub connectivity: u8,

    /// Report min(1, AVD) instead of the raw value
    #[arg(long)]
    pub clamp_avd: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl EvaluateArgs {
    /// Execute the evaluate command
    pub fn execute(&self) -> Result<()> {
        let options = EvaluationOptions {
            connectivity: connectivity_from_rank(self.connectivity)?,
            clamp_avd: self.clamp_avd,
        };

        let prediction = load_volume(&self.prediction)
            .with_context(|| format!("Failed to load prediction {}", self.prediction.display()))?;
        let ground_truth = load_volume(&self.ground_truth)
            .with_context(|| format!("Failed to load ground truth {}", self.ground_truth.display()))?;

        let case_id = pvs_eval::batch::case_id_from_path(&self.prediction)?;

        if self.region.is_empty() {
            let metrics = evaluate(&prediction, &ground_truth, options)?;
            let content = match self.format {
                OutputFormat::Text => format!("{} {}", case_id, format_metrics(&metrics)),
                OutputFormat::Json => serde_json::to_string_pretty(&metrics)?,
            };
            return emit(&content, self.output.as_deref());
        }

        let regions = self
            .region
            .iter()
            .map(|arg| load_region(arg, self.region_threshold))
            .collect::<Result<Vec<_>>>()?;
        let metrics: Vec<RegionMetrics> = evaluate_regions(&prediction, &ground_truth, &regions, options)?;

        let content = match self.format {
            OutputFormat::Text => format_case_line(&case_id, &metrics),
            OutputFormat::Json => serde_json::to_string_pretty(&metrics)?,
        };
        emit(&content, self.output.as_deref())
    }
}

/// Parse `NAME=FILE` and threshold the atlas map into a region.
fn load_region(arg: &str, threshold: f64) -> Result<RegionMask> {
    let Some((name, path)) = arg.split_once('=') else {
        bail!("region must be NAME=FILE, got {}", arg);
    };
    if name.is_empty() || path.is_empty() {
        bail!("region must be NAME=FILE, got {}", arg);
    }
    let map = load_intensities(path).with_context(|| format!("Failed to load region {}", path))?;
    Ok(RegionMask::from_atlas(name, &[map], threshold)?)
}
