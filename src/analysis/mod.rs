//! Statistical analysis of phase images
//!
//! Correlation functions, length scale extraction and the confidence model
//! built on top of them.

/// Characteristic length scale extraction from correlation grids
pub mod characteristic;
/// Two-point correlation via orthant FFTs
pub mod correlation;
/// Confidence intervals and sample count solving
pub mod interval;
/// Patch statistics cross-check for the length scale
pub mod statistics;
