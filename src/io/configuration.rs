//! Model constants and runtime configuration defaults

use crate::io::error::{AnalysisError, Result, invalid_parameter};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Prediction defaults
/// Confidence level of the reported phase fraction interval
pub const DEFAULT_CONFIDENCE: f64 = 0.95;
/// Target error as a fraction of the phase fraction
pub const DEFAULT_TARGET_ERROR: f64 = 0.05;
/// Number of points discretizing the prediction distributions
pub const DEFAULT_DIVISIONS: usize = 301;

// Plateau detection
/// Width of the distance rings scanned for the correlation plateau
pub const RING_WIDTH: f64 = 100.0;
/// Number of rings used when the image is too small for full-width rings
pub const SMALL_IMAGE_RING_COUNT: usize = 100;
/// Allowed deviation from pf² as a fraction of pf(1 - pf)
pub const PLATEAU_TOLERANCE: f64 = 0.05;
/// Fraction of deviating cells below which a ring counts as plateau
pub const PLATEAU_OUTLIER_FRACTION: f64 = 0.03;
/// Width of the band inside the plateau radius averaged for pf²
pub const PLATEAU_BAND_WIDTH: f64 = 10.0;

// Normalization coefficient
/// Divisor applied while the coefficient product exceeds one
pub const DAMPING_FACTOR: f64 = 1.1;
/// Maximum number of damping divisions
pub const MAX_DAMPING_STEPS: usize = 1000;

// Correction loop
/// Fraction of the residual removed from each biased correlation cell per step
pub const CORRECTION_STEP: f64 = 0.1;
/// Maximum correction steps before giving up
pub const MAX_CORRECTION_ITERATIONS: usize = 100;
/// Allowed ratio between the correlation and statistical length scales
pub const CLS_RATIO_BOUND: f64 = 3.0;

// Statistical cross-check
/// Exclusive upper bound of the coarse length scale scan
pub const MAX_STATISTICAL_CLS: usize = 150;
/// Points in the fine length scale scan
pub const FINE_SCAN_POINTS: usize = 50;
/// Number of patch ratios kept for the patch statistics
pub const PATCH_RATIO_COUNT: usize = 4;

// Interval model
/// Largest spread (in standard deviations of the std) of the weight distribution
pub const MAX_STD_SPREAD: f64 = 6.0;
/// Empirical model error fit for planar images as (a, b) in a / n^b
pub const STD_MODEL_2D: (f64, f64) = (48.201_753_15, 0.429_791_9);
/// Empirical model error fit for volumes as (a, b) in a / n^b
pub const STD_MODEL_3D: (f64, f64) = (444.803_518, 0.436_974_444);

// Sample count solver
/// Smallest sample count considered by the solver
pub const SOLVER_MIN_SAMPLES: f64 = 10.0;
/// Largest sample count considered by the solver
pub const SOLVER_MAX_SAMPLES: f64 = 1e9;
/// Iteration and evaluation budget of the solver
pub const SOLVER_MAX_ITERATIONS: usize = 200;
/// Absolute convergence tolerance on the sample count and objective
pub const SOLVER_TOLERANCE: f64 = 1e-4;

// Input limits
/// Smallest extent accepted along any image axis
pub const MIN_IMAGE_EXTENT: usize = 10;
/// Pixel luma at or above which a pixel belongs to the phase
pub const DEFAULT_PHASE_THRESHOLD: u8 = 128;

// Output settings
/// Suffix added to report filenames
pub const OUTPUT_SUFFIX: &str = "_representativity";
/// Threshold for switching to batch progress mode
pub const MAX_INDIVIDUAL_PROGRESS_BARS: usize = 5;
/// Width of progress bars in characters
pub const PROGRESS_BAR_WIDTH: u16 = 30;

/// Tunables shared by every stage of the analysis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Width of the distance rings scanned for the correlation plateau
    pub ring_width: f64,
    /// Number of rings used for small images
    pub small_image_ring_count: usize,
    /// Allowed deviation from pf² as a fraction of pf(1 - pf)
    pub plateau_tolerance: f64,
    /// Fraction of deviating cells below which a ring counts as plateau
    pub plateau_outlier_fraction: f64,
    /// Width of the band averaged for the plateau pf² estimate
    pub plateau_band_width: f64,
    /// Divisor applied while the coefficient product exceeds one
    pub damping_factor: f64,
    /// Maximum number of damping divisions
    pub max_damping_steps: usize,
    /// Fraction of the residual removed per correction step
    pub correction_step: f64,
    /// Maximum correction steps
    pub max_correction_iterations: usize,
    /// Allowed ratio between correlation and statistical length scales
    pub cls_ratio_bound: f64,
    /// Exclusive upper bound of the coarse statistical scan
    pub max_statistical_cls: usize,
    /// Points in the fine statistical scan
    pub fine_scan_points: usize,
    /// Number of patch ratios kept
    pub patch_ratio_count: usize,
    /// Points discretizing the prediction distributions
    pub divisions: usize,
    /// Largest spread of the weight distribution
    pub max_std_spread: f64,
    /// Model error fit (a, b) for planar images
    pub std_model_2d: (f64, f64),
    /// Model error fit (a, b) for volumes
    pub std_model_3d: (f64, f64),
    /// Sample count search interval
    pub solver_bounds: (f64, f64),
    /// Iteration and evaluation budget of the sample count solver
    pub solver_max_iterations: usize,
    /// Convergence tolerance of the sample count solver
    pub solver_tolerance: f64,
    /// Smallest extent accepted along any image axis
    pub min_extent: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ring_width: RING_WIDTH,
            small_image_ring_count: SMALL_IMAGE_RING_COUNT,
            plateau_tolerance: PLATEAU_TOLERANCE,
            plateau_outlier_fraction: PLATEAU_OUTLIER_FRACTION,
            plateau_band_width: PLATEAU_BAND_WIDTH,
            damping_factor: DAMPING_FACTOR,
            max_damping_steps: MAX_DAMPING_STEPS,
            correction_step: CORRECTION_STEP,
            max_correction_iterations: MAX_CORRECTION_ITERATIONS,
            cls_ratio_bound: CLS_RATIO_BOUND,
            max_statistical_cls: MAX_STATISTICAL_CLS,
            fine_scan_points: FINE_SCAN_POINTS,
            patch_ratio_count: PATCH_RATIO_COUNT,
            divisions: DEFAULT_DIVISIONS,
            max_std_spread: MAX_STD_SPREAD,
            std_model_2d: STD_MODEL_2D,
            std_model_3d: STD_MODEL_3D,
            solver_bounds: (SOLVER_MIN_SAMPLES, SOLVER_MAX_SAMPLES),
            solver_max_iterations: SOLVER_MAX_ITERATIONS,
            solver_tolerance: SOLVER_TOLERANCE,
            min_extent: MIN_IMAGE_EXTENT,
        }
    }
}

impl ModelConfig {
    /// Load a configuration from a JSON file, filling missing fields with defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds values rejected by [`ModelConfig::validate`]
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AnalysisError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|e| AnalysisError::ConfigLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every tunable lies in its usable range
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        require("ring_width", self.ring_width, self.ring_width > 0.0, "must be positive")?;
        require(
            "small_image_ring_count",
            self.small_image_ring_count,
            self.small_image_ring_count >= 3,
            "need at least 3 ring boundaries",
        )?;
        for (name, value) in [
            ("plateau_tolerance", self.plateau_tolerance),
            ("plateau_outlier_fraction", self.plateau_outlier_fraction),
            ("correction_step", self.correction_step),
        ] {
            require(name, value, value > 0.0 && value < 1.0, "must lie in (0, 1)")?;
        }
        require(
            "plateau_band_width",
            self.plateau_band_width,
            self.plateau_band_width >= 0.0,
            "must not be negative",
        )?;
        require(
            "damping_factor",
            self.damping_factor,
            self.damping_factor > 1.0,
            "must exceed 1",
        )?;
        require(
            "cls_ratio_bound",
            self.cls_ratio_bound,
            self.cls_ratio_bound > 1.0,
            "must exceed 1",
        )?;
        require(
            "max_statistical_cls",
            self.max_statistical_cls,
            self.max_statistical_cls >= 2,
            "coarse scan needs at least 1 candidate",
        )?;
        require(
            "fine_scan_points",
            self.fine_scan_points,
            self.fine_scan_points >= 2,
            "fine scan needs at least 2 candidates",
        )?;
        require(
            "divisions",
            self.divisions,
            self.divisions >= 3,
            "need at least 3 points",
        )?;
        require(
            "max_std_spread",
            self.max_std_spread,
            self.max_std_spread > 0.0,
            "must be positive",
        )?;
        let (low, high) = self.solver_bounds;
        require(
            "solver_bounds",
            format!("({low}, {high})"),
            low > 0.0 && high > low,
            "need 0 < lower < upper",
        )?;
        require(
            "solver_max_iterations",
            self.solver_max_iterations,
            self.solver_max_iterations > 0,
            "must be positive",
        )?;
        require(
            "solver_tolerance",
            self.solver_tolerance,
            self.solver_tolerance > 0.0,
            "must be positive",
        )?;
        require(
            "min_extent",
            self.min_extent,
            self.min_extent >= 2,
            "must be at least 2",
        )
    }

    /// Model error fit (a, b) for the given dimensionality
    pub const fn std_model_fit(&self, n_dims: usize) -> (f64, f64) {
        if n_dims == 3 {
            self.std_model_3d
        } else {
            self.std_model_2d
        }
    }
}

fn require(parameter: &'static str, value: impl ToString, valid: bool, reason: &str) -> Result<()> {
    if valid {
        Ok(())
    } else {
        Err(invalid_parameter(parameter, &value, &reason))
    }
}
