//! # Pitch Detection Module
//!
//! This module implements the time-domain autocorrelation pitch estimator
//! used by the tuner. It turns one audio frame into a single fundamental
//! frequency estimate, or `None` when the frame carries no usable pitch.
//!
//! ## Features
//! - RMS noise gate to ignore silence and the noise floor
//! - Edge trimming to stabilize the correlation peak
//! - Direct or FFT-backed autocorrelation with identical peak picking
//! - Plausibility guard against out-of-range estimates
//!
//! The estimator is stateless: every call depends on one frame only.
//! Smoothing across frames is left to the caller.

use serde::{Deserialize, Serialize};

use crate::audio::AudioFrame;
use crate::fft;

/// How the autocorrelation sequence is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    /// Direct O(n²) sum.
    #[default]
    Direct,
    /// Zero-padded FFT, O(n log n).
    Fft,
}

/// Thresholds used by [`FrequencyEstimator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// Frames with a lower RMS are treated as silence.
    pub silence_rms: f32,
    /// Samples below this magnitude mark the trim points at the edges.
    pub edge_threshold: f32,
    /// Estimates at or above this frequency are rejected.
    pub max_plausible_frequency_hz: f32,
    pub method: CorrelationMethod,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            silence_rms: 0.01,
            edge_threshold: 0.2,
            max_plausible_frequency_hz: 2000.0,
            method: CorrelationMethod::Direct,
        }
    }
}

/// Converts audio frames into fundamental frequency estimates.
#[derive(Debug, Clone, Default)]
pub struct FrequencyEstimator {
    settings: EstimatorSettings,
}

impl FrequencyEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Estimates the fundamental frequency of one frame.
    ///
    /// # Returns
    /// * `Some(frequency)` - Strictly positive estimate in Hz below the
    ///   plausible maximum
    /// * `None` - Silence, degenerate frame or implausible estimate
    pub fn estimate(&self, frame: &AudioFrame) -> Option<f32> {
        let frequency = detect_pitch_autocorrelation(&frame.samples, frame.sample_rate, &self.settings)?;
        if frequency < self.settings.max_plausible_frequency_hz {
            Some(frequency)
        } else {
            None
        }
    }
}

/// Autocorrelation pitch detection on a single buffer.
///
/// This does not apply the plausibility guard; see
/// [`FrequencyEstimator::estimate`].
///
/// # Arguments
/// * `signal` - Input audio samples in [-1, 1]
/// * `sample_rate` - Sample rate in Hz
/// * `settings` - Noise gate, edge threshold and correlation method
///
/// # Returns
/// * `Some(frequency)` - `sample_rate / period` where `period` is the
///   strongest non-trivial autocorrelation lag
/// * `None` - Empty buffer, zero sample rate, silence, or no period found
pub fn detect_pitch_autocorrelation(
    signal: &[f32],
    sample_rate: u32,
    settings: &EstimatorSettings,
) -> Option<f32> {
    let frame_size = signal.len();
    if frame_size == 0 || sample_rate == 0 {
        return None;
    }

    // --- Noise Gate: Calculate RMS to filter out silence/noise ---
    let rms = (signal.iter().map(|&s| s * s).sum::<f32>() / frame_size as f32).sqrt();
    if !rms.is_finite() || rms < settings.silence_rms {
        return None;
    }

    // --- Trim the edges down to their first quiet samples ---
    let (start, end) = trim_bounds(signal, settings.edge_threshold);
    let trimmed = &signal[start..end];
    if trimmed.len() < 2 {
        return None;
    }

    let correlation = match settings.method {
        CorrelationMethod::Direct => autocorrelate_direct(trimmed),
        CorrelationMethod::Fft => fft::autocorrelate(trimmed),
    };

    let period = find_period(&correlation)?;
    let frequency = sample_rate as f32 / period as f32;

    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        None
    }
}

/// Returns the `[start, end)` range left after cropping both edges.
///
/// `start` is the first index in the first half whose magnitude is below
/// `threshold`, `end` the matching point searched backwards from the last
/// sample. Without a match the bounds fall back to `0` and `len - 1`.
fn trim_bounds(signal: &[f32], threshold: f32) -> (usize, usize) {
    let size = signal.len();
    let half = size.div_ceil(2);

    let start = (0..half)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(0);
    let end = (1..half)
        .find(|&i| signal[size - i].abs() < threshold)
        .map(|i| size - i)
        .unwrap_or(size - 1);

    (start, end)
}

/// Un-normalized autocorrelation `c[i] = Σ_j x[j]·x[j+i]`.
fn autocorrelate_direct(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    (0..n)
        .map(|lag| {
            signal[..n - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Picks the period lag from an autocorrelation sequence.
///
/// Skips the strictly decreasing run after lag 0, then takes the lag of
/// the largest remaining value. A result of lag 0 means no period.
fn find_period(correlation: &[f32]) -> Option<usize> {
    let mut d = 0;
    while d + 1 < correlation.len() && correlation[d] > correlation[d + 1] {
        d += 1;
    }

    let mut max_val = f32::NEG_INFINITY;
    let mut max_pos = 0;
    for (i, &value) in correlation.iter().enumerate().skip(d) {
        if value > max_val {
            max_val = value;
            max_pos = i;
        }
    }

    (max_pos > 0).then_some(max_pos)
}
