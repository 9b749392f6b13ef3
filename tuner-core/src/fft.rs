//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-backed linear autocorrelation for the pitch estimator. The direct
//! O(n²) sum is fine for 2048-sample frames, but larger frames or slower
//! targets can switch to this O(n log n) path.
//!
//! The signal is zero-padded to at least twice its length so the circular
//! correlation computed in the frequency domain equals the linear one
//! (Wiener–Khinchin): `c = IFFT(|FFT(x)|²)`.

use rustfft::{FftPlanner, num_complex::Complex};

/// Computes `c[i] = Σ_j x[j]·x[j+i]` for every lag `0..x.len()`.
///
/// Results match the direct sum up to floating point rounding.
pub fn autocorrelate(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let padded_len = (2 * n).next_power_of_two();
    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(padded_len);
    let inverse = planner.plan_fft_inverse(padded_len);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(padded_len)
        .collect();

    forward.process(&mut buffer);
    for bin in buffer.iter_mut() {
        // Power spectrum: X·conj(X)
        *bin = Complex { re: bin.norm_sqr(), im: 0.0 };
    }
    inverse.process(&mut buffer);

    // rustfft does not normalize the inverse transform.
    let scale = 1.0 / padded_len as f32;
    buffer.iter().take(n).map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(signal: &[f32]) -> Vec<f32> {
        (0..signal.len())
            .map(|lag| {
                signal[..signal.len() - lag]
                    .iter()
                    .zip(&signal[lag..])
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_empty_signal() {
        assert!(autocorrelate(&[]).is_empty());
    }

    #[test]
    fn test_matches_direct_sum() {
        let signal: Vec<f32> = (0..300)
            .map(|i| (i as f32 * 0.13).sin() * 0.6 + (i as f32 * 0.41).cos() * 0.2)
            .collect();
        let expected = direct(&signal);
        let actual = autocorrelate(&signal);

        assert_eq!(actual.len(), expected.len());
        for (lag, (a, e)) in actual.iter().zip(&expected).enumerate() {
            assert!((a - e).abs() < 1e-2, "lag {}: fft {} vs direct {}", lag, a, e);
        }
    }

    #[test]
    fn test_lag_zero_is_energy() {
        let signal = [0.5_f32, -0.25, 1.0, 0.0];
        let c = autocorrelate(&signal);
        let energy: f32 = signal.iter().map(|s| s * s).sum();
        assert!((c[0] - energy).abs() < 1e-5);
    }
}
