//! Confidence intervals on the phase fraction and the sample counts needed to tighten them
//!
//! The phase fraction of an image is modelled as the mean of `n` Bernoulli
//! trials, one per characteristic-length cube. The standard deviation of that
//! mean is itself uncertain: a fitted model error spreads it into a normal
//! distribution, and the interval is read off the resulting mixture.

use crate::io::configuration::ModelConfig;
use crate::io::error::{
    AnalysisError, Result, WithContext, invalid_parameter, numerical_instability,
};
use crate::math::optimize::NelderMead;
use crate::math::probability::{bernoulli_std, linspace, normal, trapezoid, z_score};
use log::{debug, warn};
use statrs::distribution::Continuous;

/// Confidence bounds together with the discretised distribution they came from
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInterval {
    /// Lower confidence bound on the phase fraction
    pub lower: f64,
    /// Upper confidence bound on the phase fraction
    pub upper: f64,
    /// Phase fraction grid the distribution is sampled on
    pub support: Vec<f64>,
    /// Cumulative probability at every support point
    pub cumulative: Vec<f64>,
}

/// Sample count found by the solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleCountSolution {
    /// Number of characteristic-length cubes
    pub samples: f64,
    /// Remaining gap between target and achieved error
    pub residual: f64,
    /// Solver iterations used
    pub iterations: usize,
    /// Whether the solver met its tolerances
    pub converged: bool,
}

impl SampleCountSolution {
    /// Sample count, or an error if the solver ran out of budget
    ///
    /// # Errors
    ///
    /// Returns `OptimizationNonConvergence` carrying the best estimate
    pub const fn into_converged(self) -> Result<f64> {
        if self.converged {
            Ok(self.samples)
        } else {
            Err(AnalysisError::OptimizationNonConvergence {
                iterations: self.iterations,
                best_estimate: self.samples,
            })
        }
    }
}

/// Fitted model error for an image of `n_elements` pixels or voxels
pub fn std_model(n_dims: usize, n_elements: usize, config: &ModelConfig) -> f64 {
    let (scale, exponent) = config.std_model_fit(n_dims);
    scale / (n_elements as f64).powf(exponent)
}

/// Confidence interval on the phase fraction under an uncertain standard deviation
///
/// Candidate standard deviations are drawn from `N(std, (std · model_error)²)`
/// over `k = min(0.9 / model_error, max_std_spread)` spreads on either side.
/// Each candidate contributes a normal distribution around `phase_fraction`,
/// weighted by its density. The mixture is normalised, integrated into a
/// cumulative distribution, and the bounds are its two tails.
///
/// # Errors
///
/// Returns `InvalidParameter` for a non-positive `std` or `model_error`, a
/// confidence outside (0, 1) or fewer than 3 divisions, and
/// `NumericalInstability` if the mixture is not finite
pub fn predict_interval(
    phase_fraction: f64,
    std: f64,
    model_error: f64,
    confidence: f64,
    config: &ModelConfig,
) -> Result<PredictionInterval> {
    let valid_std = std.is_finite() && std > 0.0;
    if !valid_std {
        return Err(invalid_parameter("std", &std, &"must be finite and positive"));
    }
    let valid_model_error = model_error.is_finite() && model_error > 0.0;
    if !valid_model_error {
        return Err(invalid_parameter(
            "model_error",
            &model_error,
            &"must be finite and positive",
        ));
    }
    let valid_confidence = confidence > 0.0 && confidence < 1.0;
    if !valid_confidence {
        return Err(invalid_parameter("confidence", &confidence, &"must lie in (0, 1)"));
    }
    let divisions = config.divisions;
    if divisions < 3 {
        return Err(invalid_parameter("divisions", &divisions, &"need at least 3 points"));
    }

    let std_spread = std * model_error;
    let spreads = (0.9 / model_error).min(config.max_std_spread);

    let candidate_stds = linspace(
        spreads.mul_add(-std_spread, std),
        spreads.mul_add(std_spread, std),
        divisions,
    );
    let weight_distribution = normal(std, std_spread)?;
    let weights: Vec<f64> = candidate_stds
        .iter()
        .map(|&s| weight_distribution.pdf(s))
        .collect();
    let components = candidate_stds
        .iter()
        .map(|&s| normal(phase_fraction, s))
        .collect::<Result<Vec<_>>>()?;
    let support = linspace(
        spreads.mul_add(-std, phase_fraction),
        spreads.mul_add(std, phase_fraction),
        divisions,
    );

    let std_step = grid_step(&candidate_stds);
    let mut marginal: Vec<f64> = support
        .iter()
        .map(|&x| {
            components
                .iter()
                .zip(&weights)
                .map(|(component, &w)| w * component.pdf(x))
                .sum::<f64>()
                * std_step
        })
        .collect();

    let total = trapezoid(&marginal, &support).with_operation("prediction interval")?;
    let valid_total = total.is_finite() && total > 0.0;
    if !valid_total {
        return Err(numerical_instability(
            "prediction interval",
            &format!("mixture integrates to {total}"),
        ));
    }
    for density in &mut marginal {
        *density /= total;
    }

    let support_step = grid_step(&support);
    let cumulative: Vec<f64> = marginal
        .iter()
        .scan(0.0, |acc, density| {
            *acc += density * support_step;
            Some(*acc)
        })
        .collect();

    let (lower, upper) = bounds_from_cdf(&support, &cumulative, confidence)?;
    Ok(PredictionInterval {
        lower,
        upper,
        support,
        cumulative,
    })
}

fn grid_step(grid: &[f64]) -> f64 {
    match grid {
        [first, second, ..] => second - first,
        _ => 0.0,
    }
}

/// Two-sided bounds read off a discretised cumulative distribution
///
/// Each bound is the first support point whose cumulative probability exceeds
/// the corresponding tail.
///
/// # Errors
///
/// Returns `InvalidParameter` for a confidence outside (0, 1) and
/// `NumericalInstability` if either tail is never exceeded
pub fn bounds_from_cdf(support: &[f64], cumulative: &[f64], confidence: f64) -> Result<(f64, f64)> {
    let valid_confidence = confidence > 0.0 && confidence < 1.0;
    if !valid_confidence {
        return Err(invalid_parameter("confidence", &confidence, &"must lie in (0, 1)"));
    }
    let upper_tail = f64::midpoint(1.0, confidence);
    let lower_tail = 1.0 - upper_tail;

    let first_above = |tail: f64| {
        support
            .iter()
            .zip(cumulative)
            .find(|&(_, &probability)| probability > tail)
            .map(|(&x, _)| x)
            .ok_or_else(|| {
                numerical_instability(
                    "confidence bounds",
                    &format!("cumulative distribution never exceeds {tail:.4}"),
                )
            })
    };

    Ok((first_above(lower_tail)?, first_above(upper_tail)?))
}

/// Sample count at which the lower confidence bound sits `target_abs_error`
/// below the phase fraction
///
/// Minimises `|target − (pf − lower(n))|` over `n` with a bounded Nelder–Mead
/// search started at `initial_samples`. An exhausted budget is reported
/// through `converged` rather than as an error.
///
/// # Errors
///
/// Returns `InvalidParameter` for a non-positive target or start, or a phase
/// fraction outside (0, 1), and propagates interval failures
pub fn solve_sample_count_for_target(
    initial_samples: f64,
    phase_fraction: f64,
    model_error: f64,
    target_abs_error: f64,
    confidence: f64,
    config: &ModelConfig,
) -> Result<SampleCountSolution> {
    let valid_target = target_abs_error.is_finite() && target_abs_error > 0.0;
    if !valid_target {
        return Err(invalid_parameter(
            "target_abs_error",
            &target_abs_error,
            &"must be finite and positive",
        ));
    }
    let valid_start = initial_samples.is_finite() && initial_samples > 0.0;
    if !valid_start {
        return Err(invalid_parameter(
            "initial_samples",
            &initial_samples,
            &"must be finite and positive",
        ));
    }
    let valid_fraction = phase_fraction > 0.0 && phase_fraction < 1.0;
    if !valid_fraction {
        return Err(invalid_parameter(
            "phase_fraction",
            &phase_fraction,
            &"must lie in (0, 1)",
        ));
    }

    let (lower_bound, upper_bound) = config.solver_bounds;
    let solver = NelderMead::new(lower_bound, upper_bound)
        .with_budget(config.solver_max_iterations)
        .with_tolerance(config.solver_tolerance);

    let minimum = solver.minimize(initial_samples, |samples| {
        let std = bernoulli_std(phase_fraction, samples);
        let interval = predict_interval(phase_fraction, std, model_error, confidence, config)?;
        Ok((target_abs_error - (phase_fraction - interval.lower)).abs())
    })?;

    if minimum.converged {
        debug!(
            "Sample count {:.1} reaches target {target_abs_error:.5} after {} iterations",
            minimum.x, minimum.iterations
        );
    } else {
        warn!(
            "Sample count solver stopped after {} iterations at {:.1} (residual {:.2e})",
            minimum.iterations, minimum.x, minimum.value
        );
    }

    Ok(SampleCountSolution {
        samples: minimum.x,
        residual: minimum.value,
        iterations: minimum.iterations,
        converged: minimum.converged,
    })
}

/// Sample count for a target error when the standard deviation is trusted exactly
///
/// # Errors
///
/// Returns `InvalidParameter` for a non-positive target or a confidence outside (0, 1)
pub fn closed_form_sample_count(
    phase_fraction: f64,
    target_abs_error: f64,
    confidence: f64,
) -> Result<f64> {
    let valid_target = target_abs_error.is_finite() && target_abs_error > 0.0;
    if !valid_target {
        return Err(invalid_parameter(
            "target_abs_error",
            &target_abs_error,
            &"must be finite and positive",
        ));
    }
    let z = z_score(confidence)?;
    Ok(phase_fraction * (1.0 - phase_fraction) * (z / target_abs_error).powi(2))
}

/// Edge length of a cube holding `samples` cubes of edge `cls`
pub fn length_from_sample_count(samples: f64, cls: f64, n_dims: usize) -> f64 {
    let dims = n_dims as f64;
    (samples * cls.powf(dims)).powf(1.0 / dims)
}

/// Extent along the first axis holding `samples` cubes of edge `cls` when
/// every other axis keeps its current extent
///
/// # Errors
///
/// Returns `InvalidParameter` for a shape with fewer than two axes or an
/// empty trailing axis
pub fn length_along_first_axis(samples: f64, cls: f64, shape: &[usize]) -> Result<f64> {
    let Some((_, trailing)) = shape.split_first() else {
        return Err(invalid_parameter("shape", &"[]", &"needs at least two axes"));
    };
    let cross_section: usize = trailing.iter().product();
    if trailing.is_empty() || cross_section == 0 {
        return Err(invalid_parameter(
            "shape",
            &format!("{shape:?}"),
            &"needs at least two non-empty axes",
        ));
    }
    Ok(samples * cls.powf(shape.len() as f64) / cross_section as f64)
}
