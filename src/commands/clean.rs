//! Clean command implementation

use super::connectivity_from_rank;
use anyhow::{Context, Result};
use clap::Args;
use pvs_eval::nifti::{load_volume, save_volume};
use pvs_eval::postprocess::{erode_in_plane, remove_small_components};
use std::path::PathBuf;

/// Arguments for the clean command
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Input mask (NIfTI)
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output mask; gzip-compressed when the name ends in .gz
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Drop components smaller than this many voxels
    #[arg(long, value_name = "N")]
    pub min_voxels: Option<usize>,

    /// Erode each axial slice this many times
    #[arg(long, value_name = "N")]
    pub erode: Option<usize>,

    /// Connectivity rank used by --min-voxels (1 = face, the default)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub connectivity: u8,
}

impl CleanArgs {
    /// Execute the clean command
    pub fn execute(&self) -> Result<()> {
        let mut volume = load_volume(&self.input)
            .with_context(|| format!("Failed to load {}", self.input.display()))?;
        let before = volume.count_foreground();

        if let Some(iterations) = self.erode {
            volume = erode_in_plane(&volume, iterations);
        }
        if let Some(min_voxels) = self.min_voxels {
            volume = remove_small_components(&volume, min_voxels, connectivity_from_rank(self.connectivity)?)?;
        }

        save_volume(&volume, &self.output)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;
        log::info!(
            "{}: {} -> {} foreground voxels",
            self.output.display(),
            before,
            volume.count_foreground()
        );
        Ok(())
    }
}
