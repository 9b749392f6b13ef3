//! # Error Types
//!
//! Session-level failures of the tuning engine. Per-tick degradations
//! (silence, implausible pitch, degenerate frames) are never errors; they
//! surface as `None` or empty results instead.

use thiserror::Error;

/// Errors raised while building or configuring a tuning session.
#[derive(Error, Debug)]
pub enum TunerError {
    /// The audio capture device could not be acquired. Reported once so the
    /// front-end can show a permission/device prompt; retrying is up to it.
    #[error("Audio capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("Unknown tuning '{tuning}' for instrument '{instrument}'")]
    UnknownTuning { instrument: String, tuning: String },
    #[error("Unknown note: {0}")]
    UnknownNote(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur while loading, saving or validating a config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
