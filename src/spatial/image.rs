//! Binary phase images in two or three dimensions

use crate::io::error::{AnalysisError, Result};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use num_traits::ToPrimitive;

/// Segmented image where 1 marks the phase of interest and 0 everything else
///
/// Values are stored as `f64` so the correlation engine can feed them to the
/// FFT without another conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryImage {
    data: ArrayD<f64>,
}

impl BinaryImage {
    /// Build a binary image from any numeric array
    ///
    /// Elements greater than one half belong to the phase.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSourceData` if:
    /// - The array is neither 2D nor 3D
    /// - Any axis is shorter than `min_extent`
    /// - An element cannot be represented as `f64`
    pub fn from_array<T: ToPrimitive>(array: ArrayViewD<'_, T>, min_extent: usize) -> Result<Self> {
        let n_dims = array.ndim();
        if n_dims != 2 && n_dims != 3 {
            return Err(AnalysisError::InvalidSourceData {
                reason: format!("expected a 2D or 3D image, got {n_dims} dimensions"),
            });
        }
        let shortest = array.shape().iter().copied().min().unwrap_or(0);
        if shortest < min_extent.max(1) {
            return Err(AnalysisError::InvalidSourceData {
                reason: format!(
                    "image shape {:?} has an axis shorter than {min_extent}",
                    array.shape()
                ),
            });
        }

        let mut data = ArrayD::<f64>::zeros(IxDyn(array.shape()));
        for (cell, value) in data.iter_mut().zip(array.iter()) {
            let value = value.to_f64().ok_or_else(|| AnalysisError::InvalidSourceData {
                reason: "image element is not representable as f64".to_string(),
            })?;
            *cell = if value > 0.5 { 1.0 } else { 0.0 };
        }

        Ok(Self { data })
    }

    /// Build a planar image from row-major booleans
    ///
    /// # Errors
    ///
    /// Returns `InvalidSourceData` if the cell count does not match the shape
    /// or an axis is shorter than `min_extent`
    pub fn from_rows(
        height: usize,
        width: usize,
        cells: &[bool],
        min_extent: usize,
    ) -> Result<Self> {
        let array = ArrayD::from_shape_vec(IxDyn(&[height, width]), cells.to_vec()).map_err(
            |e| AnalysisError::InvalidSourceData {
                reason: format!("cannot shape {} cells as {height}x{width}: {e}", cells.len()),
            },
        )?;
        Self::from_array(array.mapv(u8::from).view(), min_extent)
    }

    /// Underlying 0/1 array
    pub const fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Extent along every axis
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of axes (2 or 3)
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of pixels or voxels
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image holds no elements (never true for a validated image)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shortest extent over all axes
    pub fn min_extent(&self) -> usize {
        self.shape().iter().copied().min().unwrap_or(0)
    }

    /// Measured phase fraction (mean of the image)
    pub fn phase_fraction(&self) -> f64 {
        self.data.mean().unwrap_or(0.0)
    }

    /// Whether only one phase is present
    pub fn is_single_phase(&self) -> bool {
        let phase_fraction = self.phase_fraction();
        phase_fraction <= 0.0 || phase_fraction >= 1.0
    }
}
