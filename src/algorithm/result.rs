//! Result record of a prediction and the queries it answers without recomputation

use crate::analysis::interval::{
    bounds_from_cdf, closed_form_sample_count, length_along_first_axis, length_from_sample_count,
    solve_sample_count_for_target,
};
use crate::io::configuration::ModelConfig;
use crate::io::error::{Result, invalid_parameter};
use crate::math::probability::z_score;
use serde::{Deserialize, Serialize};

/// Everything a prediction produced, plus the inputs needed to re-query it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Measured phase fraction of the image
    pub phase_fraction: f64,
    /// Characteristic length scale in pixels
    pub integral_range: f64,
    /// Fitted relative error of the standard deviation model
    pub std_model: f64,
    /// Standard deviation of the phase fraction under the Bernoulli model
    pub std_bernoulli: f64,
    /// Half-width of the confidence interval relative to the phase fraction
    pub percent_err: f64,
    /// Half-width of the confidence interval in phase fraction units
    pub abs_err: f64,
    /// Image edge length needed to reach the target error
    pub l: f64,
    /// Whether the sample count solver behind `l` converged
    pub l_converged: bool,
    /// Shape of the analysed image
    pub shape: Vec<usize>,
    /// Confidence level of the interval
    pub confidence: f64,
    /// Target relative error used for `l`
    pub target_error: f64,
    /// Whether model error was folded into the interval
    pub model_error: bool,
    /// Whether `l` grows every axis equally
    pub equal_shape: bool,
    /// Phase fraction grid of the interval distribution (empty without model error)
    pub support: Vec<f64>,
    /// Cumulative probability on `support`
    pub cumulative: Vec<f64>,
}

/// Edge length answering a target error query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthForTarget {
    /// Required edge length in pixels
    pub length: f64,
    /// Whether the sample count solver converged
    pub converged: bool,
}

impl ResultRecord {
    /// Number of image axes
    pub fn n_dims(&self) -> usize {
        self.shape.len()
    }

    /// Number of characteristic-length cubes in the analysed image
    pub fn sample_count(&self) -> f64 {
        let volume = self.shape.iter().product::<usize>() as f64;
        volume / self.integral_range.powi(self.n_dims() as i32)
    }

    /// Phase fraction bounds at another confidence level
    ///
    /// Uses the stored distribution when model error was included, otherwise
    /// the normal bounds `pf ± z · std_bernoulli`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a confidence outside (0, 1) and
    /// `NumericalInstability` if the stored distribution never reaches a tail
    pub fn bounds_for_confidence(&self, confidence: f64) -> Result<(f64, f64)> {
        if self.model_error && !self.support.is_empty() {
            return bounds_from_cdf(&self.support, &self.cumulative, confidence);
        }
        let half_width = z_score(confidence)? * self.std_bernoulli;
        Ok((
            self.phase_fraction - half_width,
            self.phase_fraction + half_width,
        ))
    }

    /// Edge length needed to reach `target_error` at `confidence`
    ///
    /// Reuses the stored phase fraction, length scale and model error. The
    /// solver starts from the sample count of the analysed image.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a non-positive target or a confidence
    /// outside (0, 1), and propagates solver failures
    pub fn length_for_target(
        &self,
        confidence: f64,
        target_error: f64,
        config: &ModelConfig,
    ) -> Result<LengthForTarget> {
        let valid_target = target_error.is_finite() && target_error > 0.0;
        if !valid_target {
            return Err(invalid_parameter(
                "target_error",
                &target_error,
                &"must be finite and positive",
            ));
        }
        let target_abs_error = target_error * self.phase_fraction;

        let (samples, converged) = if self.model_error {
            let solution = solve_sample_count_for_target(
                self.sample_count(),
                self.phase_fraction,
                self.std_model,
                target_abs_error,
                confidence,
                config,
            )?;
            (solution.samples, solution.converged)
        } else {
            (
                closed_form_sample_count(self.phase_fraction, target_abs_error, confidence)?,
                true,
            )
        };

        let length = if self.equal_shape {
            length_from_sample_count(samples, self.integral_range, self.n_dims())
        } else {
            length_along_first_axis(samples, self.integral_range, &self.shape)?
        };

        Ok(LengthForTarget { length, converged })
    }
}
