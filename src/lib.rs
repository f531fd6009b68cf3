//! # pvs-eval
//!
//! A Rust library for evaluating binary 3D segmentation masks, built for
//! perivascular space (PVS) detection challenges on brain MRI.
//!
//! This library provides implementations of:
//! - **Dice** coefficient (voxel overlap)
//! - **AVD** (absolute volume difference normalized by ground-truth volume)
//! - **Instance recall and precision** from 26-connected component labeling
//!
//! ## Features
//!
//! - Connected-component labeling with 6-, 18- or 26-connectivity
//! - Region-restricted evaluation using atlas masks
//! - NIfTI-1 loading (`.nii`, `.nii.gz`) and saving of masks
//! - Config-driven batch evaluation of participant submissions
//! - Explicit handling of degenerate inputs instead of NaN/Inf
//!
//! ## Quick Start
//!
//! ```rust
//! use pvs_eval::metrics::{dice, instance_recall_precision, normalized_avd};
//! use pvs_eval::types::Volume;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ground_truth = Volume::zeros([10, 10, 10]);
//! ground_truth.fill_box([0, 0, 0], [3, 3, 3]);
//!
//! let mut prediction = Volume::zeros([10, 10, 10]);
//! prediction.fill_box([2, 2, 2], [5, 5, 5]);
//!
//! let score = dice(&prediction, &ground_truth)?;
//! let avd = normalized_avd(&prediction, &ground_truth)?;
//! let (recall, precision) = instance_recall_precision(&prediction, &ground_truth)?;
//!
//! assert!(score > 0.0 && score < 1.0);
//! assert_eq!(avd, 0.0);
//! assert_eq!((recall, precision), (1.0, 1.0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Degenerate inputs
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Dice with both masks empty | `1.0` |
//! | AVD with empty ground truth | `EvalError::DegenerateInput` |
//! | Recall with no ground-truth instances | `0.0` |
//! | Precision with no predicted instances | `0.0` |
//! | Volumes of different shapes | `EvalError::ShapeMismatch` |

pub mod error;
pub mod types;
pub mod labeling;
pub mod metrics;
pub mod region;
pub mod evaluator;
pub mod postprocess;
pub mod nifti;
pub mod config;
pub mod batch;
pub mod report;

// Re-export commonly used types and functions
pub use error::{EvalError, Result};
pub use types::{CaseMetrics, InstanceCounts, LabelMap, RegionMetrics, Shape, Volume};
pub use labeling::{label, Connectivity};
pub use metrics::{dice, instance_counts, instance_recall_precision, normalized_avd};
pub use region::RegionMask;
pub use evaluator::{evaluate, evaluate_regions, EvaluationOptions};
pub use config::EvalConfig;
