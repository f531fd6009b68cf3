//! Mask clean-up applied before evaluation.

use crate::error::Result;
use crate::labeling::{label, Connectivity};
use crate::types::Volume;
use ndarray::Array3;

/// Drop every connected component with fewer than `min_voxels` voxels.
///
/// # Example
///
/// ```
/// use pvs_eval::labeling::Connectivity;
/// use pvs_eval::postprocess::remove_small_components;
/// use pvs_eval::types::Volume;
///
/// let mut volume = Volume::zeros([8, 8, 8]);
/// volume.fill_box([0, 0, 0], [2, 2, 2]); // 8 voxels
/// volume.set([6, 6, 6], true).unwrap(); // 1 voxel
///
/// let cleaned = remove_small_components(&volume, 2, Connectivity::Face).unwrap();
/// assert_eq!(cleaned.count_foreground(), 8);
/// ```
pub fn remove_small_components(volume: &Volume, min_voxels: usize, connectivity: Connectivity) -> Result<Volume> {
    let labels = label(volume, connectivity)?;
    let keep: Vec<bool> = labels
        .component_sizes()
        .iter()
        .map(|&size| size >= min_voxels)
        .collect();

    let removed = keep.iter().filter(|&&k| !k).count();
    if removed > 0 {
        log::debug!(
            "removed {} of {} components smaller than {} voxels",
            removed,
            keep.len(),
            min_voxels
        );
    }

    Ok(Volume::new(
        labels
            .labels()
            .mapv(|l| l > 0 && keep[l as usize - 1]),
    ))
}

/// Erode each Z slice with a 2D cross structuring element.
///
/// A voxel survives one iteration only if it and its four in-plane face
/// neighbours are foreground; voxels outside the volume count as background.
/// Slices are processed independently, so nothing erodes along Z.
pub fn erode_in_plane(volume: &Volume, iterations: usize) -> Volume {
    let mut current = volume.data().clone();

    for _ in 0..iterations {
        if !current.iter().any(|&v| v) {
            break;
        }
        current = erode_once(&current);
    }

    Volume::new(current)
}

fn erode_once(data: &Array3<bool>) -> Array3<bool> {
    let (nx, ny, _) = data.dim();
    let mut out = Array3::from_elem(data.dim(), false);

    for ((x, y, z), &v) in data.indexed_iter() {
        if !v || x == 0 || y == 0 || x + 1 == nx || y + 1 == ny {
            continue;
        }
        out[[x, y, z]] = data[[x - 1, y, z]]
            && data[[x + 1, y, z]]
            && data[[x, y - 1, z]]
            && data[[x, y + 1, z]];
    }

    out
}
