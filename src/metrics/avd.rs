//! Normalized absolute volume difference (AVD).

use crate::error::{EvalError, Result};
use crate::types::Volume;

/// Calculate the absolute volume difference normalized by ground-truth volume.
///
/// `avd = |count(P) - count(G)| / count(G)`
///
/// The result is unbounded above: a prediction three times the size of the
/// ground truth scores 2.0. Callers that report a capped value must clamp it
/// themselves.
///
/// # Errors
///
/// * `ShapeMismatch` if the volumes differ in shape
/// * `DegenerateInput` if the ground truth has no foreground voxels
///
/// # Example
///
/// ```
/// use pvs_eval::metrics::avd::normalized_avd;
/// use pvs_eval::types::Volume;
///
/// let mut prediction = Volume::zeros([4, 4, 4]);
/// let mut ground_truth = Volume::zeros([4, 4, 4]);
/// prediction.fill_box([0, 0, 0], [3, 4, 4]); // 48 voxels
/// ground_truth.fill_box([0, 0, 0], [2, 4, 4]); // 32 voxels
///
/// let avd = normalized_avd(&prediction, &ground_truth).unwrap();
/// assert!((avd - 0.5).abs() < 1e-12);
/// ```
pub fn normalized_avd(prediction: &Volume, ground_truth: &Volume) -> Result<f64> {
    ground_truth.ensure_same_shape(prediction)?;

    let ground_truth_volume = ground_truth.count_foreground();
    if ground_truth_volume == 0 {
        return Err(EvalError::DegenerateInput(
            "AVD is undefined for a ground truth with no foreground voxels".to_string(),
        ));
    }

    let predicted_volume = prediction.count_foreground();
    let difference = predicted_volume.abs_diff(ground_truth_volume);

    Ok(difference as f64 / ground_truth_volume as f64)
}
