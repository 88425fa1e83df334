//! Error types and context management for representativity analysis

use std::fmt;
use std::path::PathBuf;

/// Main error type for all analysis operations
#[derive(Debug)]
pub enum AnalysisError {
    /// Failed to load a source image from the filesystem
    ImageLoad {
        /// Path to the image file
        path: PathBuf,
        /// Underlying image loading error
        source: image::ImageError,
    },

    /// Source data doesn't meet the analysis requirements
    ///
    /// Raised for unsupported dimensionality, empty axes, or slices of a
    /// volume that disagree in size.
    InvalidSourceData {
        /// Description of what's wrong with the source data
        reason: String,
    },

    /// Analysis parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// The image cannot support a characteristic length or interval estimate
    ///
    /// Occurs when:
    /// - The image holds a single phase (phase fraction 0 or 1)
    /// - The image is too small to locate a correlation plateau
    /// - A denominator of the length scale model collapses to zero
    DegenerateInput {
        /// Description of the degeneracy
        reason: String,
    },

    /// A numerical step diverged or produced a non-finite value
    NumericalInstability {
        /// Name of the computation that failed
        operation: &'static str,
        /// Description of the failure
        reason: String,
    },

    /// The correlation correction loop exceeded its iteration cap
    CorrectionNonConvergence {
        /// Number of correction steps performed
        iterations: usize,
        /// Characteristic length estimate after the final step
        last_cls: f64,
    },

    /// The sample count solver exhausted its budget
    OptimizationNonConvergence {
        /// Number of solver iterations performed
        iterations: usize,
        /// Best sample count found before the budget ran out
        best_estimate: f64,
    },

    /// Failed to write or parse a JSON report
    ReportExport {
        /// Path of the report
        path: PathBuf,
        /// Underlying serialization error
        source: serde_json::Error,
    },

    /// Failed to load a model configuration file
    ConfigLoad {
        /// Path of the configuration file
        path: PathBuf,
        /// Description of the failure
        reason: String,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Numerical computation produced invalid result
    Computation {
        /// Name of the computation that failed
        operation: &'static str,
        /// Description of the failure
        reason: String,
    },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageLoad { path, source } => {
                write!(f, "Failed to load image '{}': {source}", path.display())
            }
            Self::InvalidSourceData { reason } => {
                write!(f, "Invalid source data: {reason}")
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::DegenerateInput { reason } => {
                write!(f, "Degenerate input: {reason}")
            }
            Self::NumericalInstability { operation, reason } => {
                write!(f, "Numerical instability in {operation}: {reason}")
            }
            Self::CorrectionNonConvergence {
                iterations,
                last_cls,
            } => {
                write!(
                    f,
                    "Correlation correction did not converge after {iterations} iterations (last length scale {last_cls:.3})"
                )
            }
            Self::OptimizationNonConvergence {
                iterations,
                best_estimate,
            } => {
                write!(
                    f,
                    "Sample count solver did not converge after {iterations} iterations (best estimate {best_estimate:.3})"
                )
            }
            Self::ReportExport { path, source } => {
                write!(f, "Failed to handle report '{}': {source}", path.display())
            }
            Self::ConfigLoad { path, reason } => {
                write!(f, "Failed to load config '{}': {reason}", path.display())
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
            Self::Computation { operation, reason } => {
                write!(f, "Computation error in {operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ImageLoad { source, .. } => Some(source),
            Self::ReportExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for analysis results
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Attaches the name of the failing operation to computation errors
pub trait WithContext<T> {
    /// Replace the operation name of `Computation` and `NumericalInstability` errors
    ///
    /// # Errors
    ///
    /// Propagates the original error with the operation context applied
    fn with_operation(self, operation: &'static str) -> Result<T>;
}

impl<T, E> WithContext<T> for std::result::Result<T, E>
where
    E: Into<AnalysisError>,
{
    fn with_operation(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();
            match &mut error {
                AnalysisError::Computation { operation: op, .. }
                | AnalysisError::NumericalInstability { operation: op, .. } => {
                    *op = operation;
                }
                _ => {}
            }
            error
        })
    }
}

impl From<image::ImageError> for AnalysisError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageLoad {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> AnalysisError {
    AnalysisError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a computation error
pub fn computation_error(operation: &'static str, reason: &impl ToString) -> AnalysisError {
    AnalysisError::Computation {
        operation,
        reason: reason.to_string(),
    }
}

/// Create a degenerate input error
pub fn degenerate_input(reason: &impl ToString) -> AnalysisError {
    AnalysisError::DegenerateInput {
        reason: reason.to_string(),
    }
}

/// Create a numerical instability error
pub fn numerical_instability(operation: &'static str, reason: &impl ToString) -> AnalysisError {
    AnalysisError::NumericalInstability {
        operation,
        reason: reason.to_string(),
    }
}
