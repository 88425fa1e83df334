use crate::io::error::{Result, invalid_parameter, numerical_instability};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;

/// Normal distribution `N(mean, std²)`
///
/// # Errors
///
/// Returns `InvalidParameter` unless `std` is finite and positive and
/// `mean` is finite
pub fn normal(mean: f64, std: f64) -> Result<Normal> {
    Normal::new(mean, std).map_err(|e| invalid_parameter("std", &std, &e))
}

/// Two-sided standard normal quantile for a confidence level
///
/// Returns `z` such that `P(|Z| ≤ z) = confidence`, e.g. 1.96 at 0.95.
///
/// # Errors
///
/// Returns `InvalidParameter` if the confidence lies outside (0, 1)
pub fn z_score(confidence: f64) -> Result<f64> {
    let valid = confidence > 0.0 && confidence < 1.0;
    if !valid {
        return Err(invalid_parameter(
            "confidence",
            &confidence,
            &"must lie in (0, 1)",
        ));
    }
    let standard = Normal::standard();
    Ok(standard.inverse_cdf(f64::midpoint(1.0, confidence)))
}

/// Standard deviation of the mean of `n` Bernoulli trials with success probability `p`
pub fn bernoulli_std(p: f64, n: f64) -> f64 {
    (p * (1.0 - p) / n).sqrt()
}

/// Unbiased sample standard deviation (divides by `n - 1`)
///
/// Returns `None` for fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    (values.len() >= 2).then(|| values.std_dev())
}

/// `count` evenly spaced points from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| step.mul_add(i as f64, start)).collect()
        }
    }
}

/// Trapezoidal integral of `y` sampled at `x`
///
/// # Errors
///
/// Returns `NumericalInstability` if the inputs differ in length
pub fn trapezoid(y: &[f64], x: &[f64]) -> Result<f64> {
    if y.len() != x.len() {
        return Err(numerical_instability(
            "trapezoid",
            &format!("{} samples for {} abscissae", y.len(), x.len()),
        ));
    }
    Ok(y.windows(2)
        .zip(x.windows(2))
        .map(|(ys, xs)| match (ys, xs) {
            ([y0, y1], [x0, x1]) => 0.5 * (y0 + y1) * (x1 - x0),
            _ => 0.0,
        })
        .sum())
}
