//! Batch evaluation configuration.
//!
//! A configuration maps a case identifier (the prediction file name without
//! extensions) to the files needed to evaluate it: the ground truth, and the
//! atlas maps defining each anatomical region. Nothing about directory layout
//! is hard-coded; every path is derived from the templates below.
//!
//! ```toml
//! fallback = "central-boxes"
//!
//! [evaluation]
//! connectivity = "full"
//! clamp_avd = false
//!
//! [layout]
//! ground_truth_root = "/data/ground_truth"
//! ground_truth_template = "{subject}/{case}.nii.gz"
//! subject_suffix = "_PVS"
//!
//! [[sites]]
//! name = "ED_01"
//! pattern = "ED_01"
//! atlas_root = "/data/atlas/ED_01"
//!
//! [[regions]]
//! name = "CSO"
//! files = ["cso_native_space.nii.gz"]
//! threshold = 0.5
//! ```

use crate::error::{EvalError, Result};
use crate::evaluator::EvaluationOptions;
use crate::labeling::Connectivity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// What to do with cases that match no site.
    #[serde(default)]
    pub fallback: FallbackPolicy,

    #[serde(default)]
    pub evaluation: EvaluationOptions,

    pub layout: CaseLayout,

    /// Ordered site rules; the first matching pattern wins.
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    #[serde(default = "default_regions")]
    pub regions: Vec<RegionConfig>,

    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
}

/// Path templates for locating ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseLayout {
    pub ground_truth_root: PathBuf,

    /// Relative path under `ground_truth_root`; supports `{case}` and `{subject}`.
    #[serde(default = "default_ground_truth_template")]
    pub ground_truth_template: String,

    /// Suffix stripped from the case id to obtain the subject id.
    #[serde(default)]
    pub subject_suffix: String,
}

/// An acquisition site whose cases share an atlas directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Substring of the case id identifying this site.
    pub pattern: String,
    /// Atlas maps live at `{atlas_root}/{subject}/{file}`.
    pub atlas_root: PathBuf,
}

/// An anatomical region built from one or more atlas maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    /// Atlas file names, summed before thresholding.
    pub files: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

/// Handling of cases without a matching site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Fail the case with `UnknownCase`.
    #[default]
    Error,
    /// Evaluate on synthetic central-box CSO/BG regions.
    CentralBoxes,
}

/// Optional clean-up applied to the ground truth before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Drop ground-truth components smaller than this many voxels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_component_voxels: Option<usize>,
    /// Erode the ground truth in-plane this many times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erode_iterations: Option<usize>,
    /// Adjacency used when measuring component sizes. Independent of the
    /// connectivity used for instance matching.
    #[serde(default = "default_cleanup_connectivity")]
    pub connectivity: Connectivity,
}

fn default_ground_truth_template() -> String {
    "{subject}/{case}.nii.gz".to_string()
}

fn default_threshold() -> f64 {
    0.5
}

fn default_cleanup_connectivity() -> Connectivity {
    Connectivity::Face
}

fn default_regions() -> Vec<RegionConfig> {
    vec![
        RegionConfig {
            name: crate::region::CSO.to_string(),
            files: vec!["cso_native_space.nii.gz".to_string()],
            threshold: default_threshold(),
        },
        RegionConfig {
            name: crate::region::BG.to_string(),
            files: vec![
                "lbg_native_space.nii.gz".to_string(),
                "rbg_native_space.nii.gz".to_string(),
            ],
            threshold: default_threshold(),
        },
    ]
}

impl Default for CaseLayout {
    fn default() -> Self {
        Self {
            ground_truth_root: PathBuf::from("ground_truth"),
            ground_truth_template: default_ground_truth_template(),
            subject_suffix: String::new(),
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            min_component_voxels: None,
            erode_iterations: None,
            connectivity: default_cleanup_connectivity(),
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::default(),
            evaluation: EvaluationOptions::default(),
            layout: CaseLayout::default(),
            sites: Vec::new(),
            regions: default_regions(),
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl EvalConfig {
    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: EvalConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&fs::read_to_string(path)?)?;
        log::info!(
            "loaded config {} ({} sites, {} regions)",
            path.display(),
            config.sites.len(),
            config.regions.len()
        );
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EvalError::ConfigError(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(EvalError::ConfigError("at least one region is required".to_string()));
        }
        for region in &self.regions {
            if region.files.is_empty() {
                return Err(EvalError::ConfigError(format!(
                    "region {} lists no atlas files",
                    region.name
                )));
            }
            if !region.threshold.is_finite() {
                return Err(EvalError::ConfigError(format!(
                    "region {} has a non-finite threshold",
                    region.name
                )));
            }
        }
        for site in &self.sites {
            if site.pattern.is_empty() {
                return Err(EvalError::ConfigError(format!("site {} has an empty pattern", site.name)));
            }
        }
        Ok(())
    }

    /// Subject identifier for a case.
    pub fn subject_id<'a>(&self, case_id: &'a str) -> &'a str {
        if self.layout.subject_suffix.is_empty() {
            return case_id;
        }
        case_id
            .strip_suffix(self.layout.subject_suffix.as_str())
            .unwrap_or(case_id)
    }

    /// Ground-truth path for a case.
    pub fn ground_truth_path(&self, case_id: &str) -> PathBuf {
        let relative = render_template(
            &self.layout.ground_truth_template,
            case_id,
            self.subject_id(case_id),
        );
        self.layout.ground_truth_root.join(relative)
    }

    /// First site whose pattern occurs in the case id.
    pub fn site_for(&self, case_id: &str) -> Option<&SiteConfig> {
        self.sites
            .iter()
            .find(|site| case_id.contains(site.pattern.as_str()))
    }
}

/// Substitute `{case}` and `{subject}` in a path template.
pub fn render_template(template: &str, case_id: &str, subject_id: &str) -> String {
    template
        .replace("{case}", case_id)
        .replace("{subject}", subject_id)
}
