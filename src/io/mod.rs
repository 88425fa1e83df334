//! Input/output: errors, configuration, image loading, reports, progress and CLI

/// Command-line interface and batch processing
pub mod cli;
/// Named constants and the model configuration
pub mod configuration;
/// Error types and context helpers
pub mod error;
/// PNG loading and export
pub mod image;
/// Terminal progress display
pub mod progress;
/// JSON result reports
pub mod report;
