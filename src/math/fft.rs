//! N-dimensional FFT autocorrelation built from 1D transforms along each axis

use ndarray::{ArrayD, Axis};
use rustfft::{FftDirection, FftPlanner, num_complex::Complex};

/// Circular autocorrelation `Σ_p x[p] · x[p + r]` for every offset `r`
///
/// Offsets wrap around every axis. Computed as `IFFT(FFT(x) · conj(FFT(x)))`
/// with a normalized inverse transform, so the result is an unscaled sum of
/// products. Callers divide by the element count they need.
pub fn circular_autocorrelation(data: &ArrayD<f64>) -> ArrayD<f64> {
    let mut spectrum = data.mapv(|v| Complex::new(v, 0.0));
    let mut planner = FftPlanner::<f64>::new();

    transform_all_axes(&mut spectrum, &mut planner, FftDirection::Forward);
    spectrum.mapv_inplace(|c| Complex::new(c.norm_sqr(), 0.0));
    transform_all_axes(&mut spectrum, &mut planner, FftDirection::Inverse);

    let scale = spectrum.len().max(1) as f64;
    spectrum.mapv(|c| c.re / scale)
}

// Separable transform: one pass of 1D FFTs over the lanes of every axis
fn transform_all_axes(
    data: &mut ArrayD<Complex<f64>>,
    planner: &mut FftPlanner<f64>,
    direction: FftDirection,
) {
    for axis in 0..data.ndim() {
        let len = data.len_of(Axis(axis));
        if len < 2 {
            continue;
        }
        let fft = planner.plan_fft(len, direction);
        let mut buffer = vec![Complex::new(0.0, 0.0); len];
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        for mut lane in data.lanes_mut(Axis(axis)) {
            for (slot, value) in buffer.iter_mut().zip(lane.iter()) {
                *slot = *value;
            }
            fft.process_with_scratch(&mut buffer, &mut scratch);
            for (value, slot) in lane.iter_mut().zip(buffer.iter()) {
                *value = *slot;
            }
        }
    }
}
