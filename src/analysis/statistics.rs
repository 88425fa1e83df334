//! Characteristic length scale from the spread of patch phase fractions
//!
//! The image is cut into non-overlapping patches at several ratios. If the
//! phase were a mosaic of independent squares of edge `cls`, each patch
//! phase fraction would be the mean of `patchArea / cls²` Bernoulli trials.
//! The fitted `cls` is the one whose predicted spread best matches the
//! measured spread across all ratios.

use crate::io::configuration::{DEFAULT_CONFIDENCE, ModelConfig};
use crate::io::error::Result;
use crate::math::probability::{bernoulli_std, linspace, sample_std, z_score};
use crate::spatial::image::BinaryImage;
use crate::spatial::patches::{self, PatchLayout};

/// Measured spread of patch phase fractions at one ratio
#[derive(Debug, Clone, PartialEq)]
pub struct PatchError {
    /// Patch decomposition the error was measured on
    pub layout: PatchLayout,
    /// Half-width of the confidence interval as a percentage of the phase fraction
    pub percent_error: f64,
}

/// Patch ratios used for the statistical fit, largest first
///
/// Powers of two from 2 up to `2^(⌊log2(shortest planar extent)⌋ − 6)`, plus a
/// ratio of 1 for volumes, keeping the last `patch_ratio_count`. Ratios that
/// would leave fewer than two patches are dropped.
pub fn patch_ratios(image: &BinaryImage, config: &ModelConfig) -> Vec<usize> {
    let [rows, cols] = patches::planar_extent(image);
    let shortest = rows.min(cols);
    let top_exponent = shortest.checked_ilog2().unwrap_or(0).saturating_sub(6);

    let mut ratios: Vec<usize> = (1..=top_exponent).rev().map(|i| 1usize << i).collect();
    if image.ndim() == 3 {
        ratios.push(1);
    }
    let skip = ratios.len().saturating_sub(config.patch_ratio_count);

    ratios
        .into_iter()
        .skip(skip)
        .filter(|&ratio| {
            patches::layout(image, ratio).is_ok_and(|layout| layout.count >= 2)
        })
        .collect()
}

/// Measured percentage error of the patch phase fractions at every ratio
///
/// # Errors
///
/// Returns `InvalidParameter` if a ratio does not fit the image
pub fn patch_errors(
    image: &BinaryImage,
    phase_fraction: f64,
    ratios: &[usize],
) -> Result<Vec<PatchError>> {
    let z = z_score(DEFAULT_CONFIDENCE)?;
    let mut errors = Vec::with_capacity(ratios.len());
    for &ratio in ratios {
        let (layout, fractions) = patches::patch_phase_fractions(image, ratio)?;
        if let Some(std) = sample_std(&fractions) {
            errors.push(PatchError {
                layout,
                percent_error: 100.0 * z * std / phase_fraction,
            });
        }
    }
    Ok(errors)
}

/// Number of `cls`-sized squares that fit in a patch
pub fn samples_per_patch(layout: &PatchLayout, cls: f64) -> f64 {
    layout.area() as f64 / (cls * cls)
}

/// Percentage error predicted by the Bernoulli model for a trial length scale
pub fn bernoulli_error(layout: &PatchLayout, phase_fraction: f64, cls: f64, z: f64) -> f64 {
    let n = samples_per_patch(layout, cls);
    100.0 * z * bernoulli_std(phase_fraction, n) / phase_fraction
}

// Mean absolute difference between measured and predicted errors
fn misfit(errors: &[PatchError], phase_fraction: f64, cls: f64, z: f64) -> f64 {
    let total: f64 = errors
        .iter()
        .map(|measured| {
            (measured.percent_error - bernoulli_error(&measured.layout, phase_fraction, cls, z))
                .abs()
        })
        .sum();
    total / errors.len().max(1) as f64
}

// First candidate with the smallest misfit
fn best_candidate(
    candidates: impl IntoIterator<Item = f64>,
    errors: &[PatchError],
    phase_fraction: f64,
    z: f64,
) -> Option<f64> {
    candidates
        .into_iter()
        .filter(|&cls| cls > 0.0)
        .map(|cls| (cls, misfit(errors, phase_fraction, cls, z)))
        .filter(|(_, fit)| fit.is_finite())
        .fold(None, |best: Option<(f64, f64)>, (cls, fit)| match best {
            Some((_, best_fit)) if best_fit <= fit => best,
            _ => Some((cls, fit)),
        })
        .map(|(cls, _)| cls)
}

/// Length scale that best explains the measured patch errors
///
/// A coarse scan over the integers `1..max_statistical_cls` is refined by a
/// linear scan of `fine_scan_points` candidates within one pixel of the coarse
/// optimum. Returns `None` when there is nothing to fit.
///
/// # Errors
///
/// Propagates failures of the confidence quantile
pub fn fit_cls(
    errors: &[PatchError],
    phase_fraction: f64,
    config: &ModelConfig,
) -> Result<Option<f64>> {
    if errors.is_empty() {
        return Ok(None);
    }
    let z = z_score(DEFAULT_CONFIDENCE)?;

    let coarse_candidates = (1..config.max_statistical_cls).map(|cls| cls as f64);
    let Some(coarse) = best_candidate(coarse_candidates, errors, phase_fraction, z) else {
        return Ok(None);
    };

    let fine_candidates = linspace(coarse - 1.0, coarse + 1.0, config.fine_scan_points);
    Ok(best_candidate(fine_candidates, errors, phase_fraction, z).or(Some(coarse)))
}

/// Characteristic length scale from patch statistics alone
///
/// Returns `None` when the image is too small to form two patches at any
/// ratio or the phase fraction is degenerate.
///
/// # Errors
///
/// Propagates patch decomposition failures
pub fn statistical_cls(
    image: &BinaryImage,
    phase_fraction: f64,
    config: &ModelConfig,
) -> Result<Option<f64>> {
    if phase_fraction <= 0.0 || phase_fraction >= 1.0 {
        return Ok(None);
    }
    let ratios = patch_ratios(image, config);
    let errors = patch_errors(image, phase_fraction, &ratios)?;
    fit_cls(&errors, phase_fraction, config)
}
