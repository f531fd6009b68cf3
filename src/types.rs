//! Core data types: binary volumes, label maps and metric results.

use crate::error::{EvalError, Result};
use ndarray::{s, Array3, ArrayD, Ix3, Zip};
use serde::{Deserialize, Serialize};

/// Volume dimensions as `[X, Y, Z]`.
pub type Shape = [usize; 3];

/// A dense 3D binary mask.
///
/// Voxels are addressed as `[x, y, z]`. `true` marks foreground. Numeric data
/// is binarized on construction (any nonzero value is foreground), so every
/// metric operates on plain booleans.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<bool>,
}

impl Volume {
    /// Wrap an existing boolean array.
    pub fn new(data: Array3<bool>) -> Self {
        Self { data }
    }

    /// Create an all-background volume.
    pub fn zeros(shape: Shape) -> Self {
        Self {
            data: Array3::from_elem((shape[0], shape[1], shape[2]), false),
        }
    }

    /// Build a volume from row-major (`z` fastest) booleans.
    ///
    /// # Errors
    ///
    /// Returns `InvalidVolume` if `values.len()` does not match `shape`.
    pub fn from_shape_vec(shape: Shape, values: Vec<bool>) -> Result<Self> {
        let data = Array3::from_shape_vec((shape[0], shape[1], shape[2]), values)
            .map_err(|e| EvalError::InvalidVolume(format!("{:?}: {}", shape, e)))?;
        Ok(Self { data })
    }

    /// Binarize numeric voxel data: nonzero is foreground.
    ///
    /// # Errors
    ///
    /// Returns `InvalidVolume` if any voxel is NaN, which has no binary
    /// interpretation.
    ///
    /// # Example
    ///
    /// ```
    /// use ndarray::Array3;
    /// use pvs_eval::types::Volume;
    ///
    /// let mut values = Array3::<f32>::zeros((2, 2, 2));
    /// values[[0, 1, 1]] = 0.7;
    /// let volume = Volume::from_values(&values).unwrap();
    /// assert_eq!(volume.count_foreground(), 1);
    /// ```
    pub fn from_values<T>(values: &Array3<T>) -> Result<Self>
    where
        T: Copy + Into<f64>,
    {
        if values.iter().any(|&v| Into::<f64>::into(v).is_nan()) {
            return Err(EvalError::InvalidVolume(
                "NaN voxel values cannot be binarized".to_string(),
            ));
        }
        Ok(Self {
            data: values.mapv(|v| Into::<f64>::into(v) != 0.0),
        })
    }

    /// Binarize an array of arbitrary dimensionality, requiring exactly 3 axes.
    pub fn from_dyn(values: ArrayD<f64>) -> Result<Self> {
        let ndim = values.ndim();
        let values = values.into_dimensionality::<Ix3>().map_err(|_| {
            EvalError::InvalidVolume(format!("expected 3 dimensions, got {}", ndim))
        })?;
        Self::from_values(&values)
    }

    /// Foreground where `value > threshold`.
    pub fn from_threshold(values: &Array3<f64>, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() {
            return Err(EvalError::InvalidVolume(format!(
                "threshold must be finite, got {}",
                threshold
            )));
        }
        Ok(Self {
            data: values.mapv(|v| v > threshold),
        })
    }

    /// Volume dimensions.
    pub fn shape(&self) -> Shape {
        let (x, y, z) = self.data.dim();
        [x, y, z]
    }

    /// Total number of voxels (foreground and background).
    pub fn num_voxels(&self) -> usize {
        self.data.len()
    }

    /// Borrow the underlying array.
    pub fn data(&self) -> &Array3<bool> {
        &self.data
    }

    /// Voxel value, or `None` when out of bounds.
    pub fn get(&self, index: Shape) -> Option<bool> {
        self.data.get(index).copied()
    }

    /// Set a voxel. Out-of-bounds indices are rejected.
    pub fn set(&mut self, index: Shape, value: bool) -> Result<()> {
        let shape = self.shape();
        match self.data.get_mut(index) {
            Some(voxel) => {
                *voxel = value;
                Ok(())
            }
            None => Err(EvalError::InvalidVolume(format!(
                "index {:?} out of bounds for shape {:?}",
                index, shape
            ))),
        }
    }

    /// Mark the half-open box `[start, end)` as foreground.
    ///
    /// `end` is clamped to the volume shape; an empty box is a no-op.
    pub fn fill_box(&mut self, start: Shape, end: Shape) {
        let shape = self.shape();
        let end = [
            end[0].min(shape[0]),
            end[1].min(shape[1]),
            end[2].min(shape[2]),
        ];
        if (0..3).any(|axis| start[axis] >= end[axis]) {
            return;
        }
        self.data
            .slice_mut(s![start[0]..end[0], start[1]..end[1], start[2]..end[2]])
            .fill(true);
    }

    /// Number of foreground voxels.
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Whether any voxel is foreground.
    pub fn has_foreground(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    /// Fail with `ShapeMismatch` unless `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &Volume) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(EvalError::shape_mismatch(self.shape(), other.shape()));
        }
        Ok(())
    }

    /// Number of voxels that are foreground in both volumes.
    pub fn overlap_count(&self, other: &Volume) -> Result<usize> {
        self.ensure_same_shape(other)?;
        Ok(Zip::from(&self.data)
            .and(&other.data)
            .fold(0usize, |acc, &a, &b| acc + usize::from(a && b)))
    }

    /// Elementwise AND.
    pub fn intersection(&self, other: &Volume) -> Result<Volume> {
        self.ensure_same_shape(other)?;
        Ok(Volume::new(
            Zip::from(&self.data)
                .and(&other.data)
                .map_collect(|&a, &b| a && b),
        ))
    }

    /// Elementwise OR.
    pub fn union(&self, other: &Volume) -> Result<Volume> {
        self.ensure_same_shape(other)?;
        Ok(Volume::new(
            Zip::from(&self.data)
                .and(&other.data)
                .map_collect(|&a, &b| a || b),
        ))
    }

    /// Elementwise `self AND NOT other`.
    pub fn difference(&self, other: &Volume) -> Result<Volume> {
        self.ensure_same_shape(other)?;
        Ok(Volume::new(
            Zip::from(&self.data)
                .and(&other.data)
                .map_collect(|&a, &b| a && !b),
        ))
    }
}

/// Connected-component label map.
///
/// `0` is background; components are numbered `1..=num_components` with no
/// gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: Array3<u32>,
    num_components: usize,
}

impl LabelMap {
    pub(crate) fn new(labels: Array3<u32>, num_components: usize) -> Self {
        Self {
            labels,
            num_components,
        }
    }

    /// Number of connected components (`K`).
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Borrow the label array.
    pub fn labels(&self) -> &Array3<u32> {
        &self.labels
    }

    /// Shape of the label array, matching the labeled volume.
    pub fn shape(&self) -> Shape {
        let (x, y, z) = self.labels.dim();
        [x, y, z]
    }

    /// Label at a voxel, or `None` when out of bounds.
    pub fn get(&self, index: Shape) -> Option<u32> {
        self.labels.get(index).copied()
    }

    /// Voxel count of each component; entry `i` is the size of label `i + 1`.
    pub fn component_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.num_components];
        for &label in self.labels.iter().filter(|&&l| l > 0) {
            sizes[label as usize - 1] += 1;
        }
        sizes
    }
}

/// Instance-level detection counts behind recall and precision.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceCounts {
    /// Ground-truth instances touched by any predicted foreground.
    pub true_positives: usize,
    /// Ground-truth instances with no predicted foreground.
    pub false_negatives: usize,
    /// Predicted instances with no ground-truth foreground.
    pub false_positives: usize,
    /// Number of ground-truth components (`n`).
    pub ground_truth_instances: usize,
    /// Number of predicted components (`m`).
    pub predicted_instances: usize,
    /// `TP / n`, or 0 when `n == 0`.
    pub recall: f64,
    /// `TP / m`, or 0 when `m == 0`.
    pub precision: f64,
}

/// All metrics for one case (or one region of a case).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMetrics {
    pub dice: f64,
    /// `None` when the ground truth has no foreground.
    pub avd: Option<f64>,
    pub recall: f64,
    pub precision: f64,
    pub instances: InstanceCounts,
}

/// Metrics restricted to a named anatomical region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMetrics {
    pub region: String,
    pub metrics: CaseMetrics,
}
