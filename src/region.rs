//! Anatomical region masks for region-restricted evaluation.
//!
//! Restricting an evaluation to a region means intersecting both the
//! prediction and the ground truth with the region mask before any metric is
//! computed. The metric functions themselves never see the full volume.

use crate::error::{EvalError, Result};
use crate::types::{Shape, Volume};
use ndarray::Array3;

/// Name of the centrum semiovale region.
pub const CSO: &str = "CSO";
/// Name of the basal ganglia region.
pub const BG: &str = "BG";

/// A named binary mask delimiting one anatomical region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    pub name: String,
    pub mask: Volume,
}

impl RegionMask {
    /// Create a region from an existing mask.
    pub fn new(name: impl Into<String>, mask: Volume) -> Self {
        Self {
            name: name.into(),
            mask,
        }
    }

    /// Build a region from one or more atlas maps.
    ///
    /// The maps are summed voxel-wise and the region is every voxel whose sum
    /// exceeds `threshold`. Left and right hemisphere maps of the same
    /// structure thus combine into a single region.
    ///
    /// # Errors
    ///
    /// * `InvalidVolume` if `maps` is empty or the threshold is not finite
    /// * `ShapeMismatch` if the maps differ in shape
    pub fn from_atlas(name: impl Into<String>, maps: &[Array3<f64>], threshold: f64) -> Result<Self> {
        let name = name.into();
        let (first, rest) = maps.split_first().ok_or_else(|| {
            EvalError::InvalidVolume(format!("region {} has no atlas maps", name))
        })?;

        let mut sum = first.clone();
        for map in rest {
            if map.dim() != sum.dim() {
                let (x, y, z) = sum.dim();
                let (a, b, c) = map.dim();
                return Err(EvalError::shape_mismatch([x, y, z], [a, b, c]));
            }
            sum += map;
        }

        Ok(Self {
            name,
            mask: Volume::from_threshold(&sum, threshold)?,
        })
    }

    /// Shape of the region mask.
    pub fn shape(&self) -> Shape {
        self.mask.shape()
    }

    /// Keep only the foreground of `volume` that lies inside this region.
    pub fn restrict(&self, volume: &Volume) -> Result<Volume> {
        self.mask.ensure_same_shape(volume)?;
        volume.intersection(&self.mask)
    }
}

/// Synthetic regions for cases without a registered atlas.
///
/// BG is a central box spanning the middle seventh of X and Y and the middle
/// ninth of Z. CSO is the surrounding box (middle three sevenths of X and Y,
/// middle three ninths of Z) with BG removed. The two regions are disjoint.
pub fn central_box_regions(shape: Shape) -> Result<Vec<RegionMask>> {
    let [nx, ny, nz] = shape;

    let mut bg = Volume::zeros(shape);
    bg.fill_box(
        [3 * nx / 7, 3 * ny / 7, 4 * nz / 9],
        [4 * nx / 7, 4 * ny / 7, 5 * nz / 9],
    );

    let mut outer = Volume::zeros(shape);
    outer.fill_box(
        [2 * nx / 7, 2 * ny / 7, 3 * nz / 9],
        [5 * nx / 7, 5 * ny / 7, 6 * nz / 9],
    );
    let cso = outer.difference(&bg)?;

    Ok(vec![RegionMask::new(CSO, cso), RegionMask::new(BG, bg)])
}
