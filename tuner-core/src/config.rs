//! # Configuration Module
//!
//! All tunable options of the engine in one serializable struct. Missing
//! fields fall back to their defaults, so a config file only needs to name
//! what it changes:
//!
//! ```json
//! { "tolerance_hz": 2.0, "sustain_ms": 800, "lock_policy": "timer" }
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::audio::BUFFER_SIZE;
use crate::error::ConfigError;
use crate::pitch::{CorrelationMethod, EstimatorSettings};
use crate::sustain::LockPolicy;

/// Which of the two lock policies a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPolicyKind {
    /// Frame count plus sustain time, with a wider unlock threshold.
    #[default]
    Hysteresis,
    /// Single sustain timer, locks are permanent for the target sequence.
    Timer,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Hz window around each target counted as "in tolerance".
    pub tolerance_hz: f32,
    /// Hold time required before a target locks.
    pub sustain_ms: u64,
    /// Minimum consecutive in-tolerance ticks before a target locks.
    pub required_frames: u32,
    /// RMS below which a frame is treated as silence.
    pub silence_rms: f32,
    /// Amplitude used to trim the frame edges before correlating.
    pub edge_threshold: f32,
    /// Estimates at or above this frequency are discarded.
    pub max_plausible_frequency_hz: f32,
    pub lock_policy: LockPolicyKind,
    pub correlation: CorrelationMethod,
    /// Samples per analysis frame.
    pub buffer_size: usize,
    /// Period of the session tick (16 ms is roughly display refresh).
    pub tick_interval_ms: u64,
    /// Display-level "in tune" window for the nearest target.
    pub in_tune_tolerance_hz: f32,
    /// Number of cents values averaged for display. 1 disables smoothing.
    pub smoothing_frames: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            tolerance_hz: 1.0,
            sustain_ms: 1500,
            required_frames: 5,
            silence_rms: 0.01,
            edge_threshold: 0.2,
            max_plausible_frequency_hz: 2000.0,
            lock_policy: LockPolicyKind::Hysteresis,
            correlation: CorrelationMethod::Direct,
            buffer_size: BUFFER_SIZE,
            tick_interval_ms: 16,
            in_tune_tolerance_hz: 5.0,
            smoothing_frames: 5,
        }
    }
}

impl TunerConfig {
    /// Loads a configuration from a JSON file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let config: TunerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    /// Checks that every option is usable by the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid { field, reason: reason.into() }
        }

        if !(self.tolerance_hz.is_finite() && self.tolerance_hz > 0.0) {
            return Err(invalid("tolerance_hz", "must be a positive number"));
        }
        if self.required_frames == 0 {
            return Err(invalid("required_frames", "must be at least 1"));
        }
        if !(self.silence_rms.is_finite() && self.silence_rms >= 0.0) {
            return Err(invalid("silence_rms", "must be zero or positive"));
        }
        if !(self.edge_threshold > 0.0 && self.edge_threshold <= 1.0) {
            return Err(invalid("edge_threshold", "must be in (0, 1]"));
        }
        if !(self.max_plausible_frequency_hz.is_finite() && self.max_plausible_frequency_hz > 0.0) {
            return Err(invalid("max_plausible_frequency_hz", "must be a positive number"));
        }
        if self.buffer_size < 2 {
            return Err(invalid("buffer_size", "must hold at least two samples"));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be at least 1"));
        }
        if !(self.in_tune_tolerance_hz.is_finite() && self.in_tune_tolerance_hz > 0.0) {
            return Err(invalid("in_tune_tolerance_hz", "must be a positive number"));
        }
        if self.smoothing_frames == 0 {
            return Err(invalid("smoothing_frames", "must be at least 1"));
        }
        Ok(())
    }

    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            silence_rms: self.silence_rms,
            edge_threshold: self.edge_threshold,
            max_plausible_frequency_hz: self.max_plausible_frequency_hz,
            method: self.correlation,
        }
    }

    /// Builds the lock policy selected by `lock_policy`.
    pub fn lock_policy(&self) -> LockPolicy {
        let sustain = Duration::from_millis(self.sustain_ms);
        match self.lock_policy {
            LockPolicyKind::Hysteresis => LockPolicy::Hysteresis {
                tolerance_hz: self.tolerance_hz,
                required_frames: self.required_frames,
                sustain,
            },
            LockPolicyKind::Timer => LockPolicy::Timer {
                tolerance_hz: self.tolerance_hz,
                sustain,
            },
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TunerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.required_frames, 5);
        assert_eq!(config.buffer_size, 2048);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TunerConfig =
            serde_json::from_str(r#"{ "tolerance_hz": 2.0, "lock_policy": "timer" }"#).unwrap();
        assert_eq!(config.tolerance_hz, 2.0);
        assert_eq!(config.lock_policy, LockPolicyKind::Timer);
        assert_eq!(config.sustain_ms, 1500);
        assert_eq!(config.correlation, CorrelationMethod::Direct);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = TunerConfig { tolerance_hz: 0.0, ..TunerConfig::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "tolerance_hz", .. })
        ));

        let config = TunerConfig { required_frames: 0, ..TunerConfig::default() };
        assert!(config.validate().is_err());

        let config = TunerConfig { edge_threshold: 1.5, ..TunerConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("tuner-config-{}.json", std::process::id()));
        let config = TunerConfig {
            tolerance_hz: 2.5,
            sustain_ms: 900,
            correlation: CorrelationMethod::Fft,
            ..TunerConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = TunerConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_lock_policy_mapping() {
        let config = TunerConfig { lock_policy: LockPolicyKind::Timer, sustain_ms: 800, ..TunerConfig::default() };
        match config.lock_policy() {
            LockPolicy::Timer { sustain, tolerance_hz } => {
                assert_eq!(sustain, Duration::from_millis(800));
                assert_eq!(tolerance_hz, 1.0);
            }
            other => panic!("unexpected policy {:?}", other),
        }
    }
}
