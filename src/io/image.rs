//! PNG loading into binary phase images and slice stacks

use crate::io::error::{AnalysisError, Result};
use crate::spatial::image::BinaryImage;
use ndarray::{Array2, ArrayView2, Axis};
use std::path::{Path, PathBuf};

/// Rule deciding which pixels belong to the phase of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSelector {
    /// Pixels with luma at or above the threshold
    Threshold(u8),
    /// Pixels with exactly this luma value
    Value(u8),
}

impl PhaseSelector {
    /// Whether a pixel of the given luma belongs to the phase
    pub const fn contains(self, luma: u8) -> bool {
        match self {
            Self::Threshold(threshold) => luma >= threshold,
            Self::Value(value) => luma == value,
        }
    }
}

// Per-pixel 0/1 mask of one PNG, rows first
fn phase_mask(path: &Path, selector: PhaseSelector) -> Result<Array2<u8>> {
    let luma = image::open(path)
        .map_err(|e| AnalysisError::ImageLoad {
            path: path.to_path_buf(),
            source: e,
        })?
        .into_luma8();
    let width = luma.width() as usize;
    let height = luma.height() as usize;
    let mask: Vec<u8> = luma
        .into_raw()
        .into_iter()
        .map(|value| u8::from(selector.contains(value)))
        .collect();

    Array2::from_shape_vec((height, width), mask).map_err(|e| AnalysisError::InvalidSourceData {
        reason: format!("{} has inconsistent dimensions: {e}", path.display()),
    })
}

/// Load a planar binary image from a PNG file
///
/// # Errors
///
/// Returns `ImageLoad` if the file cannot be decoded and `InvalidSourceData`
/// if the image is smaller than `min_extent` along either axis
pub fn load_png(path: &Path, selector: PhaseSelector, min_extent: usize) -> Result<BinaryImage> {
    let mask = phase_mask(path, selector)?;
    BinaryImage::from_array(mask.view().into_dyn(), min_extent)
}

/// Load a volume from PNG slices stacked along the first axis in the given order
///
/// # Errors
///
/// Returns `ImageLoad` if a slice cannot be decoded and `InvalidSourceData`
/// if there are no slices, slices disagree in size, or the volume is smaller
/// than `min_extent` along any axis
pub fn load_png_stack(
    paths: &[PathBuf],
    selector: PhaseSelector,
    min_extent: usize,
) -> Result<BinaryImage> {
    let slices = paths
        .iter()
        .map(|path| phase_mask(path, selector))
        .collect::<Result<Vec<_>>>()?;

    let Some(first) = slices.first() else {
        return Err(AnalysisError::InvalidSourceData {
            reason: "no slices to stack".to_string(),
        });
    };
    let slice_shape = first.dim();
    if let Some((path, slice)) = paths
        .iter()
        .zip(&slices)
        .find(|(_, slice)| slice.dim() != slice_shape)
    {
        return Err(AnalysisError::InvalidSourceData {
            reason: format!(
                "slice {} is {:?}, expected {slice_shape:?}",
                path.display(),
                slice.dim()
            ),
        });
    }

    let views: Vec<ArrayView2<'_, u8>> = slices.iter().map(Array2::view).collect();
    let volume = ndarray::stack(Axis(0), &views).map_err(|e| AnalysisError::InvalidSourceData {
        reason: format!("cannot stack {} slices: {e}", views.len()),
    })?;
    BinaryImage::from_array(volume.view().into_dyn(), min_extent)
}

/// PNG files in a directory, sorted by name
///
/// # Errors
///
/// Returns `FileSystem` if the directory cannot be read
pub fn png_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| AnalysisError::FileSystem {
        path: dir.to_path_buf(),
        operation: "read directory",
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| AnalysisError::FileSystem {
                path: dir.to_path_buf(),
                operation: "read directory entry",
                source: e,
            })?
            .path();
        if is_png(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Whether the path carries a `.png` extension
pub fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}
