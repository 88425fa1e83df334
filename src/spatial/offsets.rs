//! Geometry of signed offset vectors on a centred correlation grid

use ndarray::{ArrayD, Dimension, IxDyn};

/// Number of positions `p` with both `p` and `p + offset` inside an image of `shape`
pub fn overlap_count(offset: &[usize], shape: &[usize]) -> usize {
    offset
        .iter()
        .zip(shape)
        .map(|(&r, &extent)| extent.saturating_sub(r))
        .product()
}

/// Per-offset distance and overlap tables for a grid of extent `2L + 1` per axis
///
/// Cell `idx` of the grid stands for the offset `idx - L` along every axis.
#[derive(Debug, Clone)]
pub struct OffsetGrid {
    half_extent: usize,
    distances: ArrayD<f64>,
    overlap_fractions: ArrayD<f64>,
    max_distance: f64,
}

impl OffsetGrid {
    /// Build the tables for offsets up to `half_extent` on an image of `image_shape`
    pub fn new(half_extent: usize, image_shape: &[usize]) -> Self {
        let grid_shape = vec![2 * half_extent + 1; image_shape.len()];
        let volume = image_shape.iter().product::<usize>().max(1) as f64;

        let distances = ArrayD::from_shape_fn(IxDyn(&grid_shape), |idx| {
            idx.slice()
                .iter()
                .map(|&i| {
                    let r = i.abs_diff(half_extent) as f64;
                    r * r
                })
                .sum::<f64>()
                .sqrt()
        });

        // Fraction of the image still inside itself after the shift
        let overlap_fractions = ArrayD::from_shape_fn(IxDyn(&grid_shape), |idx| {
            let offset: Vec<usize> = idx.slice().iter().map(|&i| i.abs_diff(half_extent)).collect();
            overlap_count(&offset, image_shape) as f64 / volume
        });

        let max_distance = distances.iter().copied().fold(0.0, f64::max);

        Self {
            half_extent,
            distances,
            overlap_fractions,
            max_distance,
        }
    }

    /// Largest offset along any single axis
    pub const fn half_extent(&self) -> usize {
        self.half_extent
    }

    /// Euclidean length of every offset
    pub const fn distances(&self) -> &ArrayD<f64> {
        &self.distances
    }

    /// Overlap of the image with its shifted copy, as a fraction of the image volume
    pub const fn overlap_fractions(&self) -> &ArrayD<f64> {
        &self.overlap_fractions
    }

    /// Longest offset on the grid
    pub const fn max_distance(&self) -> f64 {
        self.max_distance
    }
}
