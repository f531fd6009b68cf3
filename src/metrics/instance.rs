//! Instance-level (lesion-wise) recall and precision.
//!
//! Both volumes are split into connected components. A ground-truth instance
//! is detected when any predicted foreground voxel falls inside it; a
//! predicted instance is a false positive when it touches no ground-truth
//! foreground at all. There is no overlap threshold and no one-to-one
//! assignment between instances.

use crate::error::Result;
use crate::labeling::{label, Connectivity};
use crate::types::{InstanceCounts, Volume};
use ndarray::Zip;

/// Count detected, missed and spurious instances.
///
/// # Arguments
///
/// * `prediction` - Predicted binary volume
/// * `ground_truth` - Ground truth binary volume of the same shape
/// * `connectivity` - Adjacency used to split both volumes into instances
///
/// # Errors
///
/// Returns `ShapeMismatch` if the volumes differ in shape.
pub fn instance_counts(
    prediction: &Volume,
    ground_truth: &Volume,
    connectivity: Connectivity,
) -> Result<InstanceCounts> {
    ground_truth.ensure_same_shape(prediction)?;

    let prediction_labels = label(prediction, connectivity)?;
    let ground_truth_labels = label(ground_truth, connectivity)?;

    let n = ground_truth_labels.num_components();
    let m = prediction_labels.num_components();

    // Index 0 (background) is never read back.
    let mut ground_truth_hit = vec![false; n + 1];
    let mut prediction_hit = vec![false; m + 1];

    Zip::from(ground_truth_labels.labels())
        .and(prediction_labels.labels())
        .for_each(|&gt_label, &pred_label| {
            if gt_label > 0 && pred_label > 0 {
                ground_truth_hit[gt_label as usize] = true;
                prediction_hit[pred_label as usize] = true;
            }
        });

    let true_positives = ground_truth_hit.iter().skip(1).filter(|&&hit| hit).count();
    let false_negatives = n - true_positives;
    let false_positives = prediction_hit.iter().skip(1).filter(|&&hit| !hit).count();

    log::debug!(
        "instances: n={} m={} tp={} fn={} fp={}",
        n,
        m,
        true_positives,
        false_negatives,
        false_positives
    );

    Ok(InstanceCounts {
        true_positives,
        false_negatives,
        false_positives,
        ground_truth_instances: n,
        predicted_instances: m,
        recall: ratio(true_positives, n),
        precision: ratio(true_positives, m),
    })
}

/// Calculate instance recall and precision with full (26-) connectivity.
///
/// # Returns
///
/// Returns `(recall, precision)` where recall is `TP / n` and precision is
/// `TP / m`, `n` and `m` being the number of ground-truth and predicted
/// components. Either value is 0.0 when its denominator is zero.
///
/// # Example
///
/// ```
/// use pvs_eval::metrics::instance::instance_recall_precision;
/// use pvs_eval::types::Volume;
///
/// let mut ground_truth = Volume::zeros([10, 10, 10]);
/// ground_truth.fill_box([0, 0, 0], [2, 2, 2]);
/// ground_truth.fill_box([6, 6, 6], [8, 8, 8]);
///
/// let mut prediction = Volume::zeros([10, 10, 10]);
/// prediction.fill_box([1, 1, 1], [2, 2, 2]);
///
/// let (recall, precision) = instance_recall_precision(&prediction, &ground_truth).unwrap();
/// assert_eq!(recall, 0.5);
/// assert_eq!(precision, 1.0);
/// ```
pub fn instance_recall_precision(prediction: &Volume, ground_truth: &Volume) -> Result<(f64, f64)> {
    let counts = instance_counts(prediction, ground_truth, Connectivity::Full)?;
    Ok((counts.recall, counts.precision))
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_detection() {
        let mut volume = Volume::zeros([10, 10, 10]);
        volume.fill_box([0, 0, 0], [2, 2, 2]);
        volume.fill_box([5, 5, 5], [7, 7, 7]);

        let counts = instance_counts(&volume, &volume, Connectivity::Full).unwrap();
        assert_eq!(counts.true_positives, 2);
        assert_eq!(counts.false_negatives, 0);
        assert_eq!(counts.false_positives, 0);
        assert_eq!(counts.recall, 1.0);
        assert_eq!(counts.precision, 1.0);
    }

    #[test]
    fn test_single_voxel_overlap_counts() {
        let mut ground_truth = Volume::zeros([8, 8, 8]);
        ground_truth.fill_box([0, 0, 0], [4, 4, 4]);
        let mut prediction = Volume::zeros([8, 8, 8]);
        prediction.fill_box([3, 3, 3], [6, 6, 6]);

        let (recall, precision) = instance_recall_precision(&prediction, &ground_truth).unwrap();
        assert_eq!(recall, 1.0);
        assert_eq!(precision, 1.0);
    }

    #[test]
    fn test_false_positive_component() {
        let mut ground_truth = Volume::zeros([10, 10, 10]);
        ground_truth.fill_box([0, 0, 0], [2, 2, 2]);
        let mut prediction = Volume::zeros([10, 10, 10]);
        prediction.fill_box([0, 0, 0], [2, 2, 2]);
        prediction.fill_box([7, 7, 7], [9, 9, 9]);

        let counts = instance_counts(&prediction, &ground_truth, Connectivity::Full).unwrap();
        assert_eq!(counts.predicted_instances, 2);
        assert_eq!(counts.false_positives, 1);
        assert_eq!(counts.recall, 1.0);
        assert_eq!(counts.precision, 0.5);
    }

    #[test]
    fn test_one_prediction_spanning_two_ground_truths() {
        // A single predicted bar touches both ground-truth blobs.
        let mut ground_truth = Volume::zeros([10, 3, 3]);
        ground_truth.set([0, 1, 1], true).unwrap();
        ground_truth.set([9, 1, 1], true).unwrap();
        let mut prediction = Volume::zeros([10, 3, 3]);
        prediction.fill_box([0, 0, 0], [10, 1, 1]);
        prediction.fill_box([0, 1, 1], [1, 2, 2]);
        prediction.fill_box([9, 1, 1], [10, 2, 2]);

        let counts = instance_counts(&prediction, &ground_truth, Connectivity::Full).unwrap();
        assert_eq!(counts.ground_truth_instances, 2);
        assert_eq!(counts.predicted_instances, 1);
        assert_eq!(counts.true_positives, 2);
        assert_eq!(counts.false_positives, 0);
        assert_eq!(counts.recall, 1.0);
        assert_eq!(counts.precision, 2.0);
    }

    #[test]
    fn test_two_predictions_on_one_ground_truth() {
        let mut ground_truth = Volume::zeros([10, 3, 3]);
        ground_truth.fill_box([0, 1, 1], [10, 2, 2]);
        let mut prediction = Volume::zeros([10, 3, 3]);
        prediction.set([0, 1, 1], true).unwrap();
        prediction.set([9, 1, 1], true).unwrap();

        let counts = instance_counts(&prediction, &ground_truth, Connectivity::Full).unwrap();
        assert_eq!(counts.true_positives, 1);
        assert_eq!(counts.false_positives, 0);
        assert_eq!(counts.recall, 1.0);
        assert_eq!(counts.precision, 0.5);
    }

    #[test]
    fn test_connectivity_changes_instance_count() {
        let mut ground_truth = Volume::zeros([4, 4, 4]);
        ground_truth.set([0, 0, 0], true).unwrap();
        ground_truth.set([1, 1, 1], true).unwrap();
        let mut prediction = Volume::zeros([4, 4, 4]);
        prediction.set([0, 0, 0], true).unwrap();

        let full = instance_counts(&prediction, &ground_truth, Connectivity::Full).unwrap();
        assert_eq!(full.ground_truth_instances, 1);
        assert_eq!(full.recall, 1.0);

        let face = instance_counts(&prediction, &ground_truth, Connectivity::Face).unwrap();
        assert_eq!(face.ground_truth_instances, 2);
        assert_eq!(face.recall, 0.5);
    }

    #[test]
    fn test_empty_volumes() {
        let empty = Volume::zeros([5, 5, 5]);
        assert_eq!(instance_recall_precision(&empty, &empty).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn test_empty_prediction() {
        let mut ground_truth = Volume::zeros([5, 5, 5]);
        ground_truth.fill_box([1, 1, 1], [2, 2, 2]);
        let prediction = Volume::zeros([5, 5, 5]);

        let counts = instance_counts(&prediction, &ground_truth, Connectivity::Full).unwrap();
        assert_eq!(counts.false_negatives, 1);
        assert_eq!(counts.recall, 0.0);
        assert_eq!(counts.precision, 0.0);
    }
}
