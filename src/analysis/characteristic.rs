//! Characteristic length scale from a two-point correlation grid
//!
//! The correlation decays from the phase fraction at the zero offset towards
//! its square once offsets exceed the size of typical features. Summing the
//! excess above that plateau, weighted by a coefficient that accounts for the
//! finite image, gives the volume of one feature and thus its edge length.

use crate::analysis::correlation::TwoPointCorrelation;
use crate::analysis::statistics::statistical_cls;
use crate::io::configuration::ModelConfig;
use crate::io::error::{
    AnalysisError, Result, computation_error, degenerate_input, numerical_instability,
};
use crate::math::probability::linspace;
use crate::spatial::image::BinaryImage;
use crate::spatial::offsets::OffsetGrid;
use log::debug;
use ndarray::{ArrayD, Zip};

/// Direction in which a length scale estimate must move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Estimate too small: lift correlations below the plateau
    Raise,
    /// Estimate too large: lower correlations above the plateau
    Lower,
}

/// Length scale derived from a correlation grid
#[derive(Debug, Clone, PartialEq)]
pub struct ClsEstimate {
    /// Characteristic length scale in pixels
    pub value: f64,
    /// Offset distance at which the correlation settles on its plateau
    pub plateau_distance: f64,
    /// Plateau level used in place of the squared phase fraction
    pub plateau_level: f64,
    /// Number of correction steps applied to the grid
    pub corrections: usize,
    /// Length scale from patch statistics, if the image supports one
    pub statistical_cls: Option<f64>,
}

/// Ring boundaries for the plateau search
///
/// Small grids get `small_image_ring_count` evenly spaced boundaries over
/// `[0, ⌊max_distance⌋]`; larger grids get one every `ring_width` pixels.
pub fn ring_boundaries(max_distance: f64, n_dims: usize, config: &ModelConfig) -> Vec<f64> {
    let threshold = (100.0 * (n_dims as f64).sqrt()).floor();
    let end = max_distance.floor();
    if max_distance < threshold {
        linspace(0.0, end, config.small_image_ring_count)
    } else {
        let count = (end / config.ring_width).ceil() as usize;
        (0..count).map(|i| i as f64 * config.ring_width).collect()
    }
}

/// Distance beyond which the correlation stays close to the squared phase fraction
///
/// Scans rings outward from the second boundary and returns the inner radius
/// of the first ring where the share of cells exceeding `pf²` by more than
/// `plateau_tolerance · pf(1 − pf)` drops below `plateau_outlier_fraction`.
/// Falls back to the second boundary when no ring qualifies.
///
/// # Errors
///
/// Returns `DegenerateInput` if the grid yields fewer than two ring boundaries
pub fn plateau_distance(
    values: &ArrayD<f64>,
    distances: &ArrayD<f64>,
    phase_fraction: f64,
    max_distance: f64,
    config: &ModelConfig,
) -> Result<f64> {
    let boundaries = ring_boundaries(max_distance, values.ndim(), config);
    let Some(&fallback) = boundaries.get(1) else {
        return Err(degenerate_input(&format!(
            "correlation grid reaching {max_distance:.1} px is too small to locate a plateau"
        )));
    };

    let pf_squared = phase_fraction * phase_fraction;
    let tolerance = config.plateau_tolerance * phase_fraction * (1.0 - phase_fraction);

    for ring in boundaries.windows(2).skip(1) {
        let [start, end] = ring else { continue };
        let (cells, outliers) = Zip::from(values).and(distances).fold(
            (0usize, 0usize),
            |(cells, outliers), &value, &distance| {
                if distance >= *start && distance < *end {
                    (cells + 1, outliers + usize::from(value - pf_squared > tolerance))
                } else {
                    (cells, outliers)
                }
            },
        );
        if cells == 0 {
            continue;
        }
        if (outliers as f64 / cells as f64) < config.plateau_outlier_fraction {
            return Ok(*start);
        }
    }

    Ok(fallback)
}

/// Plateau level: mean correlation over the band just inside the plateau
/// distance, averaged with the squared phase fraction
pub fn plateau_level(
    values: &ArrayD<f64>,
    distances: &ArrayD<f64>,
    phase_fraction: f64,
    plateau_distance: f64,
    config: &ModelConfig,
) -> f64 {
    let inner = plateau_distance - config.plateau_band_width;
    let (sum, count) = Zip::from(values).and(distances).fold(
        (0.0, 0usize),
        |(sum, count), &value, &distance| {
            if distance >= inner && distance <= plateau_distance {
                (sum + value, count + 1)
            } else {
                (sum, count)
            }
        },
    );
    let pf_squared = phase_fraction * phase_fraction;
    if count == 0 {
        return pf_squared;
    }
    f64::midpoint(sum / count as f64, pf_squared)
}

/// Coefficient correcting the correlation sum for the finite image
///
/// # Errors
///
/// Returns `NumericalInstability` if the overlap sum reaches the image volume,
/// the damping loop runs out of steps, or the result is not finite
pub fn normalisation_coefficient(
    grid: &OffsetGrid,
    plateau_distance: f64,
    volume: f64,
    config: &ModelConfig,
) -> Result<f64> {
    let (overlap_sum, count) = Zip::from(grid.overlap_fractions())
        .and(grid.distances())
        .fold((0.0, 0usize), |(sum, count), &fraction, &distance| {
            if distance < plateau_distance {
                (sum + fraction, count + 1)
            } else {
                (sum, count)
            }
        });

    let remaining = volume - overlap_sum;
    if remaining <= 0.0 {
        return Err(numerical_instability(
            "normalisation coefficient",
            &format!("overlap sum {overlap_sum:.3} reaches the image volume {volume}"),
        ));
    }
    let first = volume / remaining;
    let second = (count as f64 - overlap_sum) / volume;

    let mut product = first * second;
    let mut steps = 0;
    while product > 1.0 {
        if steps >= config.max_damping_steps {
            return Err(numerical_instability(
                "normalisation coefficient",
                &format!("coefficient product still {product:.3} after {steps} damping steps"),
            ));
        }
        product /= config.damping_factor;
        steps += 1;
    }
    if steps > 0 {
        debug!("Damped coefficient product in {steps} steps to {product:.4}");
    }

    let coefficient = first / (1.0 - product);
    if coefficient.is_finite() {
        Ok(coefficient)
    } else {
        Err(numerical_instability(
            "normalisation coefficient",
            &format!("coefficient {coefficient} is not finite"),
        ))
    }
}

/// Length scale from the excess correlation inside the plateau distance
///
/// # Errors
///
/// Returns `DegenerateInput` if the plateau level is not below the phase
/// fraction and `NumericalInstability` if the estimate is not finite
pub fn cls_from_correlation(
    values: &ArrayD<f64>,
    distances: &ArrayD<f64>,
    phase_fraction: f64,
    level: f64,
    plateau_distance: f64,
    coefficient: f64,
) -> Result<f64> {
    let spread = phase_fraction - level;
    if spread <= 0.0 {
        return Err(degenerate_input(&format!(
            "plateau level {level:.4} is not below the phase fraction {phase_fraction:.4}"
        )));
    }

    let excess: f64 = Zip::from(values)
        .and(distances)
        .fold(0.0, |sum, &value, &distance| {
            if distance < plateau_distance {
                sum + (value - level)
            } else {
                sum
            }
        });

    let volume = coefficient / spread * excess;
    let cls = if volume > 0.0 {
        volume.powf(1.0 / values.ndim() as f64)
    } else {
        volume
    };

    if cls.is_finite() {
        Ok(cls)
    } else {
        Err(numerical_instability(
            "length scale",
            &format!("estimate {cls} is not finite"),
        ))
    }
}

/// Whether an estimate needs correcting, and in which direction
///
/// Estimates below one pixel are always raised. When the statistical length
/// scale exceeds one pixel, estimates more than `cls_ratio_bound` times away
/// from it are pulled towards it.
pub fn correction_needed(
    cls: f64,
    statistical: Option<f64>,
    config: &ModelConfig,
) -> Option<Correction> {
    if cls < 1.0 {
        return Some(Correction::Raise);
    }
    let reference = statistical.filter(|&stat| stat > 1.0)?;
    let ratio = cls / reference;
    if ratio < 1.0 / config.cls_ratio_bound {
        Some(Correction::Raise)
    } else if ratio > config.cls_ratio_bound {
        Some(Correction::Lower)
    } else {
        None
    }
}

/// Move correlations on one side of the plateau a fixed share of the way towards it
pub fn apply_correction(values: &mut ArrayD<f64>, level: f64, correction: Correction, step: f64) {
    values.mapv_inplace(|value| match correction {
        Correction::Raise if value < level => step.mul_add(level - value, value),
        Correction::Lower if value > level => step.mul_add(-(value - level), value),
        _ => value,
    });
}

/// Characteristic length scale of the phase described by `tpc`
///
/// The estimate is cross-checked against the patch statistics of `image`.
/// While it disagrees, a private copy of the grid is nudged towards the
/// plateau and the estimate recomputed.
///
/// # Errors
///
/// Returns:
/// - `DegenerateInput` if the image holds a single phase or the grid is too small
/// - `NumericalInstability` if a coefficient or estimate is not finite
/// - `CorrectionNonConvergence` if the estimate still disagrees after
///   `max_correction_iterations` corrections
pub fn tpc_to_cls(
    tpc: &TwoPointCorrelation,
    image: &BinaryImage,
    config: &ModelConfig,
) -> Result<ClsEstimate> {
    if tpc.ndim() != image.ndim() {
        return Err(computation_error(
            "length scale",
            &format!(
                "{}D correlation grid for a {}D image",
                tpc.ndim(),
                image.ndim()
            ),
        ));
    }
    let phase_fraction = tpc.phase_fraction();
    if phase_fraction <= 0.0 || phase_fraction >= 1.0 {
        return Err(degenerate_input(&format!(
            "image holds a single phase (phase fraction {phase_fraction})"
        )));
    }

    let grid = OffsetGrid::new(tpc.half_extent(), image.shape());
    let distances = grid.distances();
    let volume = image.len() as f64;

    let plateau = plateau_distance(
        tpc.values(),
        distances,
        phase_fraction,
        grid.max_distance(),
        config,
    )?;
    let level = plateau_level(tpc.values(), distances, phase_fraction, plateau, config);
    let coefficient = normalisation_coefficient(&grid, plateau, volume, config)?;
    debug!("Plateau at {plateau:.1} px, level {level:.5}, coefficient {coefficient:.4}");

    let statistical = statistical_cls(image, phase_fraction, config)?;

    let mut values = tpc.values().clone();
    let mut cls =
        cls_from_correlation(&values, distances, phase_fraction, level, plateau, coefficient)?;
    let mut corrections = 0;

    while let Some(correction) = correction_needed(cls, statistical, config) {
        if corrections >= config.max_correction_iterations {
            return Err(AnalysisError::CorrectionNonConvergence {
                iterations: corrections,
                last_cls: cls,
            });
        }
        apply_correction(&mut values, level, correction, config.correction_step);
        corrections += 1;
        cls = cls_from_correlation(&values, distances, phase_fraction, level, plateau, coefficient)?;
        debug!("Correction {corrections} ({correction:?}): length scale {cls:.3}");
    }

    Ok(ClsEstimate {
        value: cls,
        plateau_distance: plateau,
        plateau_level: level,
        corrections,
        statistical_cls: statistical,
    })
}
