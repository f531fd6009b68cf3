//! Case-level evaluation: all metrics for one prediction/ground-truth pair.

use crate::error::{EvalError, Result};
use crate::labeling::Connectivity;
use crate::metrics::{dice, instance_counts, normalized_avd};
use crate::region::RegionMask;
use crate::types::{CaseMetrics, RegionMetrics, Volume};
use serde::{Deserialize, Serialize};

/// Knobs that change how a case is scored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationOptions {
    /// Adjacency used for instance recall/precision.
    #[serde(default)]
    pub connectivity: Connectivity,
    /// Report `min(1.0, avd)` instead of the raw AVD.
    #[serde(default)]
    pub clamp_avd: bool,
}

/// Compute Dice, AVD and instance recall/precision for one case.
///
/// AVD is `None` when the ground truth is empty; every other error
/// (mismatched shapes in particular) is returned to the caller.
///
/// # Example
///
/// ```
/// use pvs_eval::evaluator::{evaluate, EvaluationOptions};
/// use pvs_eval::types::Volume;
///
/// let mut ground_truth = Volume::zeros([10, 10, 10]);
/// ground_truth.fill_box([0, 0, 0], [3, 3, 3]);
///
/// let metrics = evaluate(&ground_truth, &ground_truth, EvaluationOptions::default()).unwrap();
/// assert_eq!(metrics.dice, 1.0);
/// assert_eq!(metrics.avd, Some(0.0));
/// assert_eq!(metrics.recall, 1.0);
/// assert_eq!(metrics.precision, 1.0);
/// ```
pub fn evaluate(prediction: &Volume, ground_truth: &Volume, options: EvaluationOptions) -> Result<CaseMetrics> {
    let dice = dice(prediction, ground_truth)?;

    let avd = match normalized_avd(prediction, ground_truth) {
        Ok(avd) if options.clamp_avd => Some(avd.min(1.0)),
        Ok(avd) => Some(avd),
        Err(EvalError::DegenerateInput(reason)) => {
            log::debug!("AVD undefined: {}", reason);
            None
        }
        Err(e) => return Err(e),
    };

    let instances = instance_counts(prediction, ground_truth, options.connectivity)?;

    Ok(CaseMetrics {
        dice,
        avd,
        recall: instances.recall,
        precision: instances.precision,
        instances,
    })
}

/// Evaluate a case restricted to one region.
pub fn evaluate_region(
    prediction: &Volume,
    ground_truth: &Volume,
    region: &RegionMask,
    options: EvaluationOptions,
) -> Result<RegionMetrics> {
    ground_truth.ensure_same_shape(prediction)?;
    let prediction = region.restrict(prediction)?;
    let ground_truth = region.restrict(ground_truth)?;

    let metrics = evaluate(&prediction, &ground_truth, options)?;
    log::debug!(
        "region {}: dice={:.4} recall={:.4} precision={:.4}",
        region.name,
        metrics.dice,
        metrics.recall,
        metrics.precision
    );

    Ok(RegionMetrics {
        region: region.name.clone(),
        metrics,
    })
}

/// Evaluate a case once per region, preserving region order.
pub fn evaluate_regions(
    prediction: &Volume,
    ground_truth: &Volume,
    regions: &[RegionMask],
    options: EvaluationOptions,
) -> Result<Vec<RegionMetrics>> {
    regions
        .iter()
        .map(|region| evaluate_region(prediction, ground_truth, region, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::central_box_regions;

    #[test]
    fn test_empty_ground_truth_has_no_avd() {
        let mut prediction = Volume::zeros([5, 5, 5]);
        prediction.fill_box([0, 0, 0], [2, 2, 2]);
        let ground_truth = Volume::zeros([5, 5, 5]);

        let metrics = evaluate(&prediction, &ground_truth, EvaluationOptions::default()).unwrap();
        assert_eq!(metrics.avd, None);
        assert_eq!(metrics.dice, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.instances.false_positives, 1);
    }

    #[test]
    fn test_clamp_avd() {
        let mut prediction = Volume::zeros([5, 5, 5]);
        prediction.fill_box([0, 0, 0], [3, 3, 3]);
        let mut ground_truth = Volume::zeros([5, 5, 5]);
        ground_truth.fill_box([0, 0, 0], [1, 1, 1]);

        let raw = evaluate(&prediction, &ground_truth, EvaluationOptions::default()).unwrap();
        assert_eq!(raw.avd, Some(26.0));

        let options = EvaluationOptions {
            clamp_avd: true,
            ..EvaluationOptions::default()
        };
        let clamped = evaluate(&prediction, &ground_truth, options).unwrap();
        assert_eq!(clamped.avd, Some(1.0));
    }

    #[test]
    fn test_shape_mismatch_propagates() {
        let prediction = Volume::zeros([5, 5, 5]);
        let ground_truth = Volume::zeros([5, 5, 4]);
        assert!(matches!(
            evaluate(&prediction, &ground_truth, EvaluationOptions::default()),
            Err(EvalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_regions_in_order() {
        let shape = [14, 14, 18];
        let mut ground_truth = Volume::zeros(shape);
        // Inside BG (x, y in 6..8, z in 8..10)
        ground_truth.fill_box([6, 6, 8], [8, 8, 10]);
        let regions = central_box_regions(shape).unwrap();

        let results =
            evaluate_regions(&ground_truth, &ground_truth, &regions, EvaluationOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].region, "CSO");
        assert_eq!(results[1].region, "BG");

        // Nothing in CSO on either side.
        assert_eq!(results[0].metrics.dice, 1.0);
        assert_eq!(results[0].metrics.avd, None);
        assert_eq!(results[1].metrics.dice, 1.0);
        assert_eq!(results[1].metrics.avd, Some(0.0));
    }
}
