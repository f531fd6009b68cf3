//! Dice similarity coefficient.

use crate::error::Result;
use crate::types::Volume;

/// Calculate the Dice coefficient between a prediction and a ground truth.
///
/// Dice is twice the overlap divided by the total foreground:
/// `2 * |P ∩ G| / (|P| + |G|)`.
///
/// # Arguments
///
/// * `prediction` - Predicted binary volume
/// * `ground_truth` - Ground truth binary volume of the same shape
///
/// # Returns
///
/// Returns a value between 0.0 (no overlap) and 1.0 (identical masks).
/// When neither volume has any foreground the masks agree completely and the
/// result is 1.0.
///
/// # Errors
///
/// Returns `ShapeMismatch` if the volumes differ in shape.
///
/// # Example
///
/// ```
/// use pvs_eval::metrics::dice::dice;
/// use pvs_eval::types::Volume;
///
/// let mut prediction = Volume::zeros([4, 4, 4]);
/// let mut ground_truth = Volume::zeros([4, 4, 4]);
/// prediction.fill_box([0, 0, 0], [2, 4, 4]);
/// ground_truth.fill_box([1, 0, 0], [3, 4, 4]);
///
/// let score = dice(&prediction, &ground_truth).unwrap();
/// assert!((score - 0.5).abs() < 1e-12);
/// ```
pub fn dice(prediction: &Volume, ground_truth: &Volume) -> Result<f64> {
    let intersection = ground_truth.overlap_count(prediction)?;
    let total = prediction.count_foreground() + ground_truth.count_foreground();

    if total == 0 {
        log::debug!("dice: both volumes empty, treating as perfect agreement");
        return Ok(1.0);
    }

    Ok(2.0 * intersection as f64 / total as f64)
}
