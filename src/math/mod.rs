//! Mathematical utilities for the analysis

/// FFT-based autocorrelation of N-dimensional arrays
pub mod fft;
/// Bounded derivative-free minimization
pub mod optimize;
/// Normal distribution helpers and sample statistics
pub mod probability;
