//! Batch evaluation over a directory of participant predictions.

use crate::config::{EvalConfig, FallbackPolicy};
use crate::error::{EvalError, Result};
use crate::evaluator::evaluate_regions;
use crate::nifti::{load_intensities, load_volume};
use crate::postprocess::{erode_in_plane, remove_small_components};
use crate::region::{central_box_regions, RegionMask};
use crate::types::{RegionMetrics, Volume};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a case's regions come from.
#[derive(Debug, Clone, PartialEq)]
pub enum AtlasSource {
    /// Atlas maps of a configured site: `(region name, files, threshold)`.
    Site {
        site: String,
        regions: Vec<(String, Vec<PathBuf>, f64)>,
    },
    /// Synthetic central boxes sized to the prediction.
    CentralBoxes,
}

/// Every file needed to evaluate one case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFiles {
    pub case_id: String,
    pub subject_id: String,
    pub prediction: PathBuf,
    pub ground_truth: PathBuf,
    pub atlas: AtlasSource,
}

/// Per-region metrics for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub case_id: String,
    /// `None` when synthetic regions were used.
    pub site: Option<String>,
    pub regions: Vec<RegionMetrics>,
}

/// Result of evaluating one case in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    Evaluated(CaseReport),
    Failed { case_id: String, error: String },
}

impl CaseOutcome {
    pub fn case_id(&self) -> &str {
        match self {
            CaseOutcome::Evaluated(report) => &report.case_id,
            CaseOutcome::Failed { case_id, .. } => case_id,
        }
    }
}

/// Case identifier of a prediction file: its name up to the first `.`.
///
/// ```
/// use pvs_eval::batch::case_id_from_path;
///
/// assert_eq!(case_id_from_path("team/ED_01_0001_PVS.nii.gz").unwrap(), "ED_01_0001_PVS");
/// ```
pub fn case_id_from_path<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EvalError::UnknownCase(format!("cannot derive case id from {}", path.display())))
}

fn is_nifti(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".nii.gz") || name.ends_with(".nii"))
}

/// Find prediction files under `root`.
///
/// Each immediate subdirectory contributes its first NIfTI file in name
/// order (one submission folder per case); NIfTI files directly under `root`
/// are included as well. The result is sorted.
pub fn discover_predictions<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(EvalError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("prediction directory not found: {}", root.display()),
        )));
    }

    let pattern = glob::Pattern::escape(&root.to_string_lossy());
    let mut found = Vec::new();

    for entry in glob_sorted(&format!("{}/*", pattern))? {
        if entry.is_dir() {
            let inner = glob::Pattern::escape(&entry.to_string_lossy());
            match glob_sorted(&format!("{}/*.nii*", inner))?
                .into_iter()
                .find(|p| is_nifti(p))
            {
                Some(path) => found.push(path),
                None => log::warn!("no NIfTI prediction in {}", entry.display()),
            }
        } else if is_nifti(&entry) {
            found.push(entry);
        }
    }

    found.sort();
    log::info!("found {} predictions under {}", found.len(), root.display());
    Ok(found)
}

fn glob_sorted(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|e| EvalError::ConfigError(e.to_string()))?;
    let mut out = Vec::new();
    for path in paths {
        out.push(path.map_err(|e| EvalError::IoError(e.into_error()))?);
    }
    out.sort();
    Ok(out)
}

/// Map a prediction file to its ground truth and atlas files.
///
/// # Errors
///
/// Returns `UnknownCase` if no site matches and the fallback policy is
/// `error`.
pub fn resolve_case<P: AsRef<Path>>(config: &EvalConfig, prediction: P) -> Result<CaseFiles> {
    let prediction = prediction.as_ref().to_path_buf();
    let case_id = case_id_from_path(&prediction)?;
    let subject_id = config.subject_id(&case_id).to_string();
    let ground_truth = config.ground_truth_path(&case_id);

    let atlas = match config.site_for(&case_id) {
        Some(site) => {
            let subject_dir = site.atlas_root.join(&subject_id);
            AtlasSource::Site {
                site: site.name.clone(),
                regions: config
                    .regions
                    .iter()
                    .map(|region| {
                        let files = region.files.iter().map(|f| subject_dir.join(f)).collect();
                        (region.name.clone(), files, region.threshold)
                    })
                    .collect(),
            }
        }
        None => match config.fallback {
            FallbackPolicy::CentralBoxes => AtlasSource::CentralBoxes,
            FallbackPolicy::Error => {
                return Err(EvalError::UnknownCase(format!(
                    "no site pattern matches {}",
                    case_id
                )))
            }
        },
    };

    Ok(CaseFiles {
        case_id,
        subject_id,
        prediction,
        ground_truth,
        atlas,
    })
}

/// Build the region masks of a case, checking them against `shape`.
pub fn load_regions(atlas: &AtlasSource, shape: [usize; 3]) -> Result<Vec<RegionMask>> {
    let regions = match atlas {
        AtlasSource::CentralBoxes => central_box_regions(shape)?,
        AtlasSource::Site { regions, .. } => regions
            .iter()
            .map(|(name, files, threshold)| {
                let maps = files
                    .iter()
                    .map(load_intensities)
                    .collect::<Result<Vec<_>>>()?;
                RegionMask::from_atlas(name.as_str(), &maps, *threshold)
            })
            .collect::<Result<Vec<_>>>()?,
    };

    for region in &regions {
        if region.shape() != shape {
            return Err(EvalError::shape_mismatch(shape, region.shape()));
        }
    }
    Ok(regions)
}

/// Apply the configured ground-truth clean-up.
///
/// Erosion runs first, then small components are dropped using
/// `preprocessing.connectivity`.
pub fn preprocess_ground_truth(config: &EvalConfig, mut ground_truth: Volume) -> Result<Volume> {
    let preprocessing = &config.preprocessing;
    if let Some(iterations) = preprocessing.erode_iterations {
        ground_truth = erode_in_plane(&ground_truth, iterations);
    }
    if let Some(min_voxels) = preprocessing.min_component_voxels {
        ground_truth = remove_small_components(&ground_truth, min_voxels, preprocessing.connectivity)?;
    }
    Ok(ground_truth)
}

/// Load and evaluate a single resolved case.
pub fn evaluate_case(config: &EvalConfig, files: &CaseFiles) -> Result<CaseReport> {
    let prediction = load_volume(&files.prediction)?;
    let ground_truth = load_volume(&files.ground_truth)?;
    ground_truth.ensure_same_shape(&prediction)?;

    let ground_truth = preprocess_ground_truth(config, ground_truth)?;
    let regions = load_regions(&files.atlas, prediction.shape())?;
    let metrics = evaluate_regions(&prediction, &ground_truth, &regions, config.evaluation)?;

    let site = match &files.atlas {
        AtlasSource::Site { site, .. } => Some(site.clone()),
        AtlasSource::CentralBoxes => None,
    };

    Ok(CaseReport {
        case_id: files.case_id.clone(),
        site,
        regions: metrics,
    })
}

/// Evaluate every prediction under `prediction_root`.
///
/// Cases are evaluated in parallel; a failing case is reported as
/// [`CaseOutcome::Failed`] without stopping the batch. Outcomes are in
/// prediction-path order.
pub fn run_batch<P: AsRef<Path>>(config: &EvalConfig, prediction_root: P) -> Result<Vec<CaseOutcome>> {
    let predictions = discover_predictions(prediction_root)?;

    let outcomes: Vec<CaseOutcome> = predictions
        .par_iter()
        .map(|path| {
            let outcome = resolve_case(config, path).and_then(|files| evaluate_case(config, &files));
            match outcome {
                Ok(report) => {
                    log::info!("evaluated {}", report.case_id);
                    CaseOutcome::Evaluated(report)
                }
                Err(e) => {
                    let case_id = case_id_from_path(path)
                        .unwrap_or_else(|_| path.display().to_string());
                    log::warn!("case {} failed: {}", case_id, e);
                    CaseOutcome::Failed {
                        case_id,
                        error: e.to_string(),
                    }
                }
            }
        })
        .collect();

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaseLayout, SiteConfig};
    use crate::labeling::Connectivity;

    fn config_with_site() -> EvalConfig {
        EvalConfig {
            layout: CaseLayout {
                ground_truth_root: PathBuf::from("/gt"),
                ground_truth_template: "{subject}/{case}.nii.gz".to_string(),
                subject_suffix: "_PVS".to_string(),
            },
            sites: vec![SiteConfig {
                name: "site-a".to_string(),
                pattern: "SA".to_string(),
                atlas_root: PathBuf::from("/atlas/a"),
            }],
            ..EvalConfig::default()
        }
    }

    #[test]
    fn test_case_id_from_path() {
        assert_eq!(case_id_from_path("/x/y/SA_001_PVS.nii.gz").unwrap(), "SA_001_PVS");
        assert_eq!(case_id_from_path("SA_001.nii").unwrap(), "SA_001");
        assert!(case_id_from_path("/x/.hidden").is_err());
    }

    #[test]
    fn test_resolve_site_case() {
        let files = resolve_case(&config_with_site(), "/pred/team/SA_001_PVS.nii.gz").unwrap();
        assert_eq!(files.case_id, "SA_001_PVS");
        assert_eq!(files.subject_id, "SA_001");
        assert_eq!(files.ground_truth, PathBuf::from("/gt/SA_001/SA_001_PVS.nii.gz"));
        match files.atlas {
            AtlasSource::Site { site, regions } => {
                assert_eq!(site, "site-a");
                assert_eq!(regions.len(), 2);
                assert_eq!(regions[0].0, "CSO");
                assert_eq!(
                    regions[1].1,
                    vec![
                        PathBuf::from("/atlas/a/SA_001/lbg_native_space.nii.gz"),
                        PathBuf::from("/atlas/a/SA_001/rbg_native_space.nii.gz"),
                    ]
                );
            }
            other => panic!("expected site atlas, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_unknown_case() {
        let config = config_with_site();
        assert!(matches!(
            resolve_case(&config, "/pred/ZZ_001_PVS.nii.gz"),
            Err(EvalError::UnknownCase(_))
        ));

        let config = EvalConfig {
            fallback: FallbackPolicy::CentralBoxes,
            ..config
        };
        let files = resolve_case(&config, "/pred/ZZ_001_PVS.nii.gz").unwrap();
        assert_eq!(files.atlas, AtlasSource::CentralBoxes);
    }

    #[test]
    fn test_preprocess_ground_truth() {
        let mut config = config_with_site();
        config.preprocessing.min_component_voxels = Some(2);

        let mut ground_truth = Volume::zeros([6, 6, 6]);
        ground_truth.fill_box([0, 0, 0], [2, 2, 2]);
        ground_truth.set([5, 5, 5], true).unwrap();

        let cleaned = preprocess_ground_truth(&config, ground_truth).unwrap();
        assert_eq!(cleaned.count_foreground(), 8);
    }

    #[test]
    fn test_preprocess_uses_face_connectivity_by_default() {
        let mut config = config_with_site();
        config.preprocessing.min_component_voxels = Some(2);
        assert_eq!(config.evaluation.connectivity, Connectivity::Full);

        let mut ground_truth = Volume::zeros([4, 4, 4]);
        ground_truth.set([0, 0, 0], true).unwrap();
        ground_truth.set([1, 1, 1], true).unwrap();

        let cleaned = preprocess_ground_truth(&config, ground_truth.clone()).unwrap();
        assert!(!cleaned.has_foreground());

        config.preprocessing.connectivity = Connectivity::Full;
        let cleaned = preprocess_ground_truth(&config, ground_truth).unwrap();
        assert_eq!(cleaned.count_foreground(), 2);
    }

    #[test]
    fn test_preprocess_erodes_before_removing() {
        let mut config = config_with_site();
        config.preprocessing.erode_iterations = Some(1);

        // A 3x3 square on two slices erodes to its centre column.
        let mut ground_truth = Volume::zeros([5, 5, 2]);
        ground_truth.fill_box([1, 1, 0], [4, 4, 2]);
        let eroded = preprocess_ground_truth(&config, ground_truth.clone()).unwrap();
        assert_eq!(eroded.count_foreground(), 2);
        assert_eq!(eroded.get([2, 2, 0]), Some(true));

        // The surviving column is one 2-voxel component; a 3-voxel minimum
        // removes it only because erosion ran first.
        config.preprocessing.min_component_voxels = Some(3);
        let cleaned = preprocess_ground_truth(&config, ground_truth).unwrap();
        assert!(!cleaned.has_foreground());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CaseOutcome::Failed {
            case_id: "c1".to_string(),
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["case_id"], "c1");
        assert_eq!(outcome.case_id(), "c1");
    }
}
