//! Spatial data structures for phase images
//!
//! This module contains spatial-related functionality including:
//! - Validated binary images in two or three dimensions
//! - Non-overlapping patch decomposition
//! - Offset geometry of correlation grids

/// Binary phase image container
pub mod image;
/// Offset distances and overlap fractions on correlation grids
pub mod offsets;
/// Patch decomposition for variance statistics
pub mod patches;

pub use image::BinaryImage;
