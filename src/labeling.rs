//! Connected-component labeling of 3D binary volumes.

use crate::error::{EvalError, Result};
use crate::types::{LabelMap, Volume};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Voxel adjacency used to decide whether two foreground voxels are connected.
///
/// Variants follow the usual rank convention: rank 1 connects voxels sharing a
/// face, rank 2 adds shared edges, rank 3 adds shared corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// 6-connectivity.
    Face,
    /// 18-connectivity.
    Edge,
    /// 26-connectivity.
    #[default]
    Full,
}

impl Connectivity {
    /// Map a rank (1, 2 or 3) to a connectivity.
    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(Connectivity::Face),
            2 => Some(Connectivity::Edge),
            3 => Some(Connectivity::Full),
            _ => None,
        }
    }

    /// Maximum number of axes along which a neighbour may differ.
    pub fn rank(self) -> u8 {
        match self {
            Connectivity::Face => 1,
            Connectivity::Edge => 2,
            Connectivity::Full => 3,
        }
    }

    /// Neighbour offsets `(dx, dy, dz)` for this connectivity.
    pub fn offsets(self) -> Vec<[isize; 3]> {
        let rank = self.rank() as usize;
        let mut offsets = Vec::with_capacity(26);
        for dx in -1isize..=1 {
            for dy in -1isize..=1 {
                for dz in -1isize..=1 {
                    let moved = [dx, dy, dz].iter().filter(|&&d| d != 0).count();
                    if moved > 0 && moved <= rank {
                        offsets.push([dx, dy, dz]);
                    }
                }
            }
        }
        offsets
    }
}

/// Label the connected components of `volume`.
///
/// Components are discovered in raster order (`x`, then `y`, then `z`
/// slowest-to-fastest) and numbered from 1 with no gaps, so the result always
/// contains exactly the labels `0..=K`.
///
/// # Errors
///
/// Returns `InvalidVolume` if the volume holds more than `u32::MAX`
/// components.
///
/// # Example
///
/// ```
/// use pvs_eval::labeling::{label, Connectivity};
/// use pvs_eval::types::Volume;
///
/// let mut volume = Volume::zeros([4, 4, 4]);
/// volume.set([0, 0, 0], true).unwrap();
/// volume.set([1, 1, 1], true).unwrap();
///
/// assert_eq!(label(&volume, Connectivity::Full).unwrap().num_components(), 1);
/// assert_eq!(label(&volume, Connectivity::Face).unwrap().num_components(), 2);
/// ```
pub fn label(volume: &Volume, connectivity: Connectivity) -> Result<LabelMap> {
    let [nx, ny, nz] = volume.shape();
    let offsets = connectivity.offsets();
    let mut labels = Array3::<u32>::zeros((nx, ny, nz));
    let mut next_label: u32 = 0;
    let mut stack: Vec<[usize; 3]> = Vec::new();

    for ((x, y, z), &foreground) in volume.data().indexed_iter() {
        if !foreground || labels[[x, y, z]] != 0 {
            continue;
        }

        next_label = advance_label(next_label)?;
        labels[[x, y, z]] = next_label;
        stack.push([x, y, z]);

        // Depth-first flood fill; voxels are labeled when pushed so each is
        // visited once.
        while let Some([cx, cy, cz]) = stack.pop() {
            for offset in &offsets {
                let Some(neighbor) = step([cx, cy, cz], *offset, [nx, ny, nz]) else {
                    continue;
                };
                if volume.data()[neighbor] && labels[neighbor] == 0 {
                    labels[neighbor] = next_label;
                    stack.push(neighbor);
                }
            }
        }
    }

    Ok(LabelMap::new(labels, next_label as usize))
}

fn advance_label(current: u32) -> Result<u32> {
    current.checked_add(1).ok_or_else(|| {
        EvalError::InvalidVolume(format!("more than {} connected components", u32::MAX))
    })
}

/// Move `index` by `offset`, returning `None` outside `[0, shape)`.
fn step(index: [usize; 3], offset: [isize; 3], shape: [usize; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for axis in 0..3 {
        let moved = index[axis].checked_add_signed(offset[axis])?;
        if moved >= shape[axis] {
            return None;
        }
        out[axis] = moved;
    }
    Some(out)
}
