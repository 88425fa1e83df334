//! Phase fraction confidence and characteristic length scale estimation for binary microstructures
//!
//! The two-point correlation of a segmented image yields the characteristic
//! length scale of its phase. Treating the image as a collection of
//! independent cubes of that size gives a confidence interval on the phase
//! fraction and the image size needed to reach a target error.

#![forbid(unsafe_code)]

/// Prediction pipeline and result records
pub mod algorithm;
/// Correlation, length scale and confidence analysis
pub mod analysis;
/// Input/output operations and error handling
pub mod io;
/// Mathematical utilities for FFTs, optimization and probability calculations
pub mod math;
/// Binary images, patch decomposition and offset geometry
pub mod spatial;

pub use algorithm::executor::{PredictionParams, RepresentativityAnalyzer, make_error_prediction};
pub use algorithm::result::ResultRecord;
pub use io::error::{AnalysisError, Result};
pub use spatial::BinaryImage;
