//! Two-point correlation of binary images computed orthant by orthant with FFTs
//!
//! The correlation at offset `r` is the probability that both `x` and `x + r`
//! lie in the phase. A single FFT autocorrelation only yields offsets whose
//! components share one sign pattern, so the image is flipped along subsets of
//! its leading axes and each flip contributes one orthant of the full grid.
//! Every orthant is written together with its point mirror, which makes the
//! assembled grid symmetric under `r -> -r` without a separate pass.

use crate::io::error::{AnalysisError, Result, invalid_parameter};
use crate::math::fft::circular_autocorrelation;
use crate::spatial::image::BinaryImage;
use crate::spatial::offsets::overlap_count;
use ndarray::{ArrayD, Axis, Dimension, IxDyn, Slice};

/// Sign pattern of one FFT pass over the offset space
///
/// Axes listed in `flipped` are reversed before the transform and their offsets
/// land on the negative side of the grid. The last axis is never flipped: its
/// negative side is covered by the point mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orthant {
    flipped: &'static [usize],
}

/// Orthants of a planar offset grid
pub static PLANAR_ORTHANTS: [Orthant; 2] = [Orthant { flipped: &[] }, Orthant { flipped: &[0] }];

/// Orthants of a volumetric offset grid
pub static VOLUMETRIC_ORTHANTS: [Orthant; 4] = [
    Orthant { flipped: &[] },
    Orthant { flipped: &[0] },
    Orthant { flipped: &[1] },
    Orthant { flipped: &[0, 1] },
];

impl Orthant {
    /// Orthant table for an image with `n_dims` axes
    ///
    /// # Errors
    ///
    /// Returns `InvalidSourceData` for anything other than 2 or 3 axes
    pub fn table(n_dims: usize) -> Result<&'static [Self]> {
        match n_dims {
            2 => Ok(&PLANAR_ORTHANTS),
            3 => Ok(&VOLUMETRIC_ORTHANTS),
            _ => Err(AnalysisError::InvalidSourceData {
                reason: format!("no orthant table for {n_dims} dimensions"),
            }),
        }
    }

    /// Axes reversed for this orthant
    pub const fn flipped_axes(&self) -> &'static [usize] {
        self.flipped
    }

    /// Whether `axis` is reversed for this orthant
    pub fn is_flipped(&self, axis: usize) -> bool {
        self.flipped.contains(&axis)
    }

    /// Grid index of a non-negative offset component along `axis`
    ///
    /// Flipped axes map onto `0..=L`, all others onto `L..=2L`.
    pub fn grid_index(&self, axis: usize, offset: usize, half_extent: usize) -> usize {
        if self.is_flipped(axis) {
            half_extent - offset
        } else {
            half_extent + offset
        }
    }
}

/// Two-point correlation grid of extent `2L + 1` along every axis
///
/// Cell `idx` holds the correlation at offset `idx - L`.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoPointCorrelation {
    values: ArrayD<f64>,
    half_extent: usize,
}

impl TwoPointCorrelation {
    /// Correlation values on the full signed offset grid
    pub const fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    /// Largest offset `L` along any single axis
    pub const fn half_extent(&self) -> usize {
        self.half_extent
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        self.values.ndim()
    }

    /// Correlation at the zero offset
    pub fn center(&self) -> f64 {
        self.values
            .get(vec![self.half_extent; self.ndim()].as_slice())
            .copied()
            .unwrap_or(0.0)
    }

    /// Phase fraction of the source image (the zero-offset correlation)
    pub fn phase_fraction(&self) -> f64 {
        self.center()
    }

    /// Correlation at a signed offset, `None` outside the grid
    pub fn at(&self, offset: &[isize]) -> Option<f64> {
        if offset.len() != self.ndim() {
            return None;
        }
        let half = self.half_extent as isize;
        let index = offset
            .iter()
            .map(|&r| usize::try_from(r + half).ok())
            .collect::<Option<Vec<usize>>>()?;
        self.values.get(index.as_slice()).copied()
    }
}

/// Two-point correlation for every offset up to `desired_length` along each axis
///
/// Periodic images wrap around their edges. Non-periodic images are zero padded
/// and every offset is rescaled by the number of positions where the shifted
/// image still overlaps itself.
///
/// # Errors
///
/// Returns `InvalidParameter` if `desired_length` is zero or not shorter than
/// the shortest axis
pub fn two_point_correlation(
    image: &BinaryImage,
    desired_length: usize,
    periodic: bool,
) -> Result<TwoPointCorrelation> {
    let shortest = image.min_extent();
    if desired_length == 0 || desired_length >= shortest {
        return Err(invalid_parameter(
            "desired_length",
            &desired_length,
            &format!("must lie in 1..{shortest} for an image with shortest axis {shortest}"),
        ));
    }

    let n_dims = image.ndim();
    let side = 2 * desired_length + 1;
    let mut values = ArrayD::<f64>::zeros(IxDyn(&vec![side; n_dims]));

    for orthant in Orthant::table(n_dims)? {
        let block = orthant_block(image, orthant, desired_length, periodic);
        for (offset, &value) in block.indexed_iter() {
            let positive: Vec<usize> = offset
                .slice()
                .iter()
                .enumerate()
                .map(|(axis, &r)| orthant.grid_index(axis, r, desired_length))
                .collect();
            let mirrored: Vec<usize> = positive.iter().map(|&i| side - 1 - i).collect();

            for index in [positive, mirrored] {
                if let Some(cell) = values.get_mut(index.as_slice()) {
                    *cell = value;
                }
            }
        }
    }

    // Zero offset is the phase fraction by definition
    if let Some(center) = values.get_mut(vec![desired_length; n_dims].as_slice()) {
        *center = image.phase_fraction();
    }

    Ok(TwoPointCorrelation {
        values,
        half_extent: desired_length,
    })
}

/// Two-point correlation reaching as far as the image allows
///
/// Periodic images use half the shortest axis, non-periodic images one less
/// than the shortest axis.
///
/// # Errors
///
/// Returns `InvalidParameter` if the image is too small for a single offset
pub fn radial_tpc(image: &BinaryImage, periodic: bool) -> Result<TwoPointCorrelation> {
    let shortest = image.min_extent();
    let desired_length = if periodic {
        shortest / 2
    } else {
        shortest.saturating_sub(1)
    };
    two_point_correlation(image, desired_length, periodic)
}

// Correlations for the non-negative offsets of one orthant, indexed by |r|
fn orthant_block(
    image: &BinaryImage,
    orthant: &Orthant,
    desired_length: usize,
    periodic: bool,
) -> ArrayD<f64> {
    let mut view = image.data().view();
    for &axis in orthant.flipped_axes() {
        view.invert_axis(Axis(axis));
    }

    let source = if periodic {
        view.to_owned()
    } else {
        let padded_shape: Vec<usize> = image
            .shape()
            .iter()
            .map(|&extent| extent + desired_length + 1)
            .collect();
        let mut padded = ArrayD::<f64>::zeros(IxDyn(&padded_shape));
        padded
            .slice_each_axis_mut(|axis| Slice::from(0..axis.len - desired_length - 1))
            .assign(&view);
        padded
    };

    let count = image.len() as f64;
    let correlation = circular_autocorrelation(&source);
    let mut block = correlation
        .slice_each_axis(|_| Slice::from(0..desired_length + 1))
        .mapv(|v| v / count);

    if !periodic {
        for (offset, value) in block.indexed_iter_mut() {
            let overlap = overlap_count(offset.slice(), image.shape()).max(1);
            *value *= count / overlap as f64;
        }
    }

    block
}
