//! Non-overlapping patch decomposition for patch-variance statistics
//!
//! Planar images are cut into `ratio × ratio` equal patches. Volumes are read
//! as a stack of planar slices along the first axis, and every slice is cut
//! the same way, so ratio 1 yields one patch per slice. Remainder rows and
//! columns that do not fill a whole patch are ignored.

use crate::io::error::{Result, invalid_parameter};
use crate::spatial::image::BinaryImage;
use ndarray::IxDyn;

/// Geometry of one patch decomposition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLayout {
    /// Ratio of planar image edge length to patch edge length
    pub ratio: usize,
    /// Planar extent (rows, columns) of every patch
    pub patch_shape: [usize; 2],
    /// Number of patches produced
    pub count: usize,
}

impl PatchLayout {
    /// Planar patch area in pixels
    pub const fn area(&self) -> usize {
        self.patch_shape[0] * self.patch_shape[1]
    }
}

/// Planar extents (rows, columns) of the image: its last two axes
pub fn planar_extent(image: &BinaryImage) -> [usize; 2] {
    let shape = image.shape();
    let n = shape.len();
    [
        shape.get(n.saturating_sub(2)).copied().unwrap_or(0),
        shape.get(n.saturating_sub(1)).copied().unwrap_or(0),
    ]
}

/// Number of slices along the stacking axis (1 for planar images)
pub fn stack_depth(image: &BinaryImage) -> usize {
    if image.ndim() == 3 {
        image.shape().first().copied().unwrap_or(1)
    } else {
        1
    }
}

/// Describe the decomposition of `image` at the given ratio
///
/// # Errors
///
/// Returns `InvalidParameter` if the ratio is zero or larger than a planar extent
pub fn layout(image: &BinaryImage, ratio: usize) -> Result<PatchLayout> {
    let [rows, cols] = planar_extent(image);
    if ratio == 0 || ratio > rows || ratio > cols {
        return Err(invalid_parameter(
            "ratio",
            &ratio,
            &format!("must lie in 1..={} for a {rows}x{cols} plane", rows.min(cols)),
        ));
    }
    Ok(PatchLayout {
        ratio,
        patch_shape: [rows / ratio, cols / ratio],
        count: stack_depth(image) * ratio * ratio,
    })
}

/// Phase fraction of every patch at the given ratio
///
/// # Errors
///
/// Returns `InvalidParameter` if the ratio does not fit the image
pub fn patch_phase_fractions(
    image: &BinaryImage,
    ratio: usize,
) -> Result<(PatchLayout, Vec<f64>)> {
    let layout = layout(image, ratio)?;
    let [patch_rows, patch_cols] = layout.patch_shape;
    let chunk: Vec<usize> = if image.ndim() == 3 {
        vec![1, patch_rows, patch_cols]
    } else {
        vec![patch_rows, patch_cols]
    };

    let fractions: Vec<f64> = image
        .data()
        .exact_chunks(IxDyn(&chunk))
        .into_iter()
        .map(|patch| patch.mean().unwrap_or(0.0))
        .collect();

    Ok((layout, fractions))
}
