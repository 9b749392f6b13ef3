// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate is responsible for pitch detection, note matching and
//! deciding when a string is "in tune and held". It is completely
//! headless and contains no presentation code.

pub mod audio;
#[cfg(feature = "capture")]
pub mod capture;
pub mod config;
pub mod error;
pub mod fft;
pub mod instrument;
pub mod pitch;
pub mod session;
pub mod sustain;
pub mod tuning;

pub use audio::{AudioFrame, AudioSource, BUFFER_SIZE};
pub use config::{LockPolicyKind, TunerConfig};
pub use error::{ConfigError, TunerError};
pub use pitch::{CorrelationMethod, FrequencyEstimator};
pub use session::{TickOutput, TuningSession};
pub use sustain::{LockPolicy, LockedSet, SustainTracker, Target, TargetId};
pub use tuning::NoteMatch;
