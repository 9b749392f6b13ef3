//! # Tuning Session
//!
//! Wires the estimator, the note matcher and the sustain tracker together
//! once per tick, and publishes the result to any number of observers.
//!
//! ## Architecture
//! - **Source**: owned exclusively by the session, closed on stop and drop
//! - **Tick**: pull frame -> estimate -> match note -> update locks
//! - **Observers**: crossbeam channels receiving every `TickOutput`
//!
//! Everything after frame acquisition is synchronous and runs to
//! completion inside the tick, so no locking is needed.

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::audio::{AudioFrame, AudioSource};
use crate::config::TunerConfig;
use crate::error::TunerError;
use crate::instrument;
use crate::pitch::FrequencyEstimator;
use crate::sustain::{LockedSet, SustainTracker, Target, TargetId};
use crate::tuning;

/// Everything the presentation layer needs for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickOutput {
    /// Detected fundamental, `None` on a no-pitch tick.
    pub frequency_hz: Option<f32>,
    /// Closest note of the note table.
    pub note: Option<String>,
    /// Deviation from `note` in cents, 0 without pitch.
    pub cents_deviation: f32,
    /// Moving average of recent cents values against the same `note`.
    pub smoothed_cents: Option<f32>,
    /// Target closest in Hz to the detected frequency.
    pub nearest_target: Option<TargetId>,
    /// Signed Hz distance to `nearest_target`, positive = sharp.
    pub hz_difference: Option<f32>,
    /// `hz_difference` lies within the display tolerance.
    pub in_tune: bool,
    pub locked_targets: LockedSet,
    /// Targets locked at least once since the target sequence was set.
    pub tuned_targets: LockedSet,
}

/// One tuning session over one audio source.
pub struct TuningSession<S: AudioSource> {
    source: Option<S>,
    config: TunerConfig,
    estimator: FrequencyEstimator,
    tracker: SustainTracker,
    targets: Vec<Target>,
    cents_window: VecDeque<f32>,
    /// Note the cents in `cents_window` are measured against.
    window_note: Option<String>,
    tuned: LockedSet,
    subscribers: Vec<Sender<TickOutput>>,
    last_output: TickOutput,
}

impl<S: AudioSource> TuningSession<S> {
    /// Creates a session that owns `source` until it stops.
    pub fn new(source: S, config: TunerConfig) -> Result<Self, TunerError> {
        config.validate()?;
        info!(
            "[SESSION] Starting session at {} Hz ({:?} lock policy)",
            source.sample_rate(),
            config.lock_policy
        );
        Ok(Self {
            source: Some(source),
            estimator: FrequencyEstimator::new(config.estimator_settings()),
            tracker: SustainTracker::new(config.lock_policy()),
            cents_window: VecDeque::with_capacity(config.smoothing_frames),
            window_note: None,
            tuned: LockedSet::default(),
            config,
            targets: Vec::new(),
            subscribers: Vec::new(),
            last_output: TickOutput::default(),
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn tracker(&self) -> &SustainTracker {
        &self.tracker
    }

    /// The most recent tick result.
    pub fn last_output(&self) -> &TickOutput {
        &self.last_output
    }

    /// The owned audio source, until the session stops.
    pub fn source_mut(&mut self) -> Option<&mut S> {
        self.source.as_mut()
    }

    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }

    /// Replaces the target sequence and discards all lock state with it.
    pub fn set_targets(&mut self, targets: Vec<Target>) {
        info!("[SESSION] Switching to {} target(s)", targets.len());
        self.tracker.reset(&targets);
        self.targets = targets;
        self.tuned = LockedSet::default();
        self.last_output.locked_targets = LockedSet::default();
        self.last_output.tuned_targets = LockedSet::default();
    }

    /// Selects an instrument with its default tuning.
    pub fn select_instrument(&mut self, instrument_id: &str) -> Result<(), TunerError> {
        let instrument = instrument::find_instrument(instrument_id)?;
        let tuning = instrument.default_tuning()?;
        self.set_targets(tuning.targets());
        Ok(())
    }

    pub fn select_tuning(&mut self, instrument_id: &str, tuning_id: &str) -> Result<(), TunerError> {
        let tuning = instrument::find_instrument(instrument_id)?.tuning(tuning_id)?;
        self.set_targets(tuning.targets());
        Ok(())
    }

    /// Registers an observer. It receives every tick until the session stops.
    pub fn subscribe(&mut self) -> Receiver<TickOutput> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Pulls the next frame from the source and processes it.
    ///
    /// A tick without an available frame counts as a no-pitch tick.
    pub fn tick(&mut self, now: Instant) -> TickOutput {
        let frame = self.source.as_mut().and_then(|source| source.next_frame());
        let output = self.process_frame(now, frame.as_ref());
        self.publish(&output);
        output
    }

    /// Runs the estimate/match/track pipeline on one frame.
    pub fn process_frame(&mut self, now: Instant, frame: Option<&AudioFrame>) -> TickOutput {
        let frequency = frame.and_then(|f| self.estimator.estimate(f));
        let note_match = frequency.and_then(tuning::closest_note);

        match &note_match {
            Some(m) => {
                if self.window_note.as_deref() != Some(m.note.as_str()) {
                    self.cents_window.clear();
                    self.window_note = Some(m.note.clone());
                }
                if self.cents_window.len() == self.config.smoothing_frames {
                    self.cents_window.pop_front();
                }
                self.cents_window.push_back(m.cents_deviation);
            }
            None => {
                self.cents_window.clear();
                self.window_note = None;
            }
        }
        let smoothed_cents = (!self.cents_window.is_empty())
            .then(|| self.cents_window.iter().sum::<f32>() / self.cents_window.len() as f32);

        let nearest = frequency.and_then(|f| nearest_target(&self.targets, f));
        let hz_difference = nearest.map(|(_, diff)| diff);
        let locked_targets = self.tracker.update(now, frequency, &self.targets);
        if locked_targets.iter().any(|id| !self.tuned.contains(id)) {
            self.tuned = self.tuned.iter().chain(locked_targets.iter()).collect();
        }

        let output = TickOutput {
            frequency_hz: frequency,
            cents_deviation: note_match.as_ref().map_or(0.0, |m| m.cents_deviation),
            note: note_match.map(|m| m.note),
            smoothed_cents,
            nearest_target: nearest.map(|(id, _)| id),
            hz_difference,
            in_tune: hz_difference.is_some_and(|d| d.abs() <= self.config.in_tune_tolerance_hz),
            locked_targets,
            tuned_targets: self.tuned.clone(),
        };

        if output.locked_targets != self.last_output.locked_targets {
            debug!("[SESSION] Locked targets: {:?}", output.locked_targets);
        }
        self.last_output = output.clone();
        output
    }

    /// Ticks at `tick_interval_ms` until `shutdown` fires, its sender is
    /// dropped, or the source finishes. The session is stopped on return.
    pub fn run(&mut self, shutdown: &Receiver<()>) {
        let ticker = crossbeam_channel::tick(self.config.tick_interval());
        info!("[SESSION] Entering tick loop...");

        while self.is_running() {
            crossbeam_channel::select! {
                recv(ticker) -> msg => {
                    let now = msg.unwrap_or_else(|_| Instant::now());
                    self.tick(now);
                    if self.source.as_ref().is_none_or(|source| source.is_finished()) {
                        info!("[SESSION] Audio source finished");
                        break;
                    }
                },
                recv(shutdown) -> _ => {
                    info!("[SESSION] Received shutdown signal");
                    break;
                },
            }
        }

        self.stop();
    }

    /// Releases the audio source and disconnects all observers.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            info!("[SESSION] Stopping session and releasing audio source");
            source.close();
        }
        self.subscribers.clear();
    }

    fn publish(&mut self, output: &TickOutput) {
        let before = self.subscribers.len();
        self.subscribers.retain(|tx| tx.send(output.clone()).is_ok());
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            warn!("[SESSION] Dropped {} disconnected subscriber(s)", dropped);
        }
    }
}

#[cfg(feature = "capture")]
impl TuningSession<crate::capture::CaptureSource> {
    /// Opens the default microphone and starts a session on it.
    pub fn with_microphone(config: TunerConfig) -> Result<Self, TunerError> {
        config.validate()?;
        let source = crate::capture::CaptureSource::open(config.buffer_size)?;
        Self::new(source, config)
    }
}

impl<S: AudioSource> Drop for TuningSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Closest target to `frequency` and the signed Hz difference to it.
fn nearest_target(targets: &[Target], frequency: f32) -> Option<(TargetId, f32)> {
    let mut best: Option<(TargetId, f32)> = None;
    for (i, target) in targets.iter().enumerate() {
        let diff = frequency - target.frequency;
        if best.is_none_or(|(_, best_diff)| diff.abs() < best_diff.abs()) {
            best = Some((TargetId(i), diff));
        }
    }
    best
}
