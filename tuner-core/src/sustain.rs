//! # Sustain Tracking Module
//!
//! Decides when a target is "in tune and held" rather than merely passing
//! through. One tracker state is kept per target position, and two lock
//! policies are available behind the same `update` call:
//!
//! - [`LockPolicy::Hysteresis`]: a target locks after `required_frames`
//!   consecutive in-tolerance ticks spanning at least `sustain`, and only
//!   unlocks once the deviation exceeds `tolerance_hz * UNLOCK_FACTOR`.
//! - [`LockPolicy::Timer`]: entering tolerance starts a timer, leaving it
//!   cancels the timer, and a timer that runs out locks the target for the
//!   rest of the target sequence.
//!
//! A tick without pitch breaks every running streak but never unlocks a
//! target that is already locked.

use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::TunerError;
use crate::tuning;

/// Multiplier applied to the tolerance to get the unlock threshold.
pub const UNLOCK_FACTOR: f32 = 1.5;

/// One frequency the performer is trying to reach, e.g. one string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub label: String,
    pub frequency: f32,
}

impl Target {
    pub fn new(label: impl Into<String>, frequency: f32) -> Self {
        Self { label: label.into(), frequency }
    }

    /// Builds a target from a note name of the standard table.
    pub fn from_note(name: &str) -> Result<Self, TunerError> {
        let frequency = tuning::note_frequency(name).ok_or_else(|| TunerError::UnknownNote(name.to_string()))?;
        Ok(Self::new(name, frequency))
    }
}

/// Position of a target in the session's target sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetId(pub usize);

/// Targets currently locked, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LockedSet(BTreeSet<TargetId>);

impl LockedSet {
    pub fn contains(&self, id: TargetId) -> bool {
        self.0.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<TargetId> for LockedSet {
    fn from_iter<I: IntoIterator<Item = TargetId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a target gets locked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockPolicy {
    Hysteresis {
        tolerance_hz: f32,
        required_frames: u32,
        sustain: Duration,
    },
    Timer {
        tolerance_hz: f32,
        sustain: Duration,
    },
}

impl LockPolicy {
    pub fn tolerance_hz(&self) -> f32 {
        match *self {
            LockPolicy::Hysteresis { tolerance_hz, .. } | LockPolicy::Timer { tolerance_hz, .. } => tolerance_hz,
        }
    }

    pub fn sustain(&self) -> Duration {
        match *self {
            LockPolicy::Hysteresis { sustain, .. } | LockPolicy::Timer { sustain, .. } => sustain,
        }
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        LockPolicy::Hysteresis {
            tolerance_hz: 1.0,
            required_frames: 5,
            sustain: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Searching,
    Locked,
}

/// Per-target lock state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    /// Consecutive in-tolerance ticks of the current streak.
    pub consecutive_inside_frames: u32,
    /// When the current streak (or timer) started.
    pub window_start: Option<Instant>,
    pub locked: bool,
}

impl TrackerState {
    pub fn phase(&self) -> TrackerPhase {
        if self.locked { TrackerPhase::Locked } else { TrackerPhase::Searching }
    }

    fn break_streak(&mut self) {
        self.consecutive_inside_frames = 0;
        self.window_start = None;
    }

    /// Counts one in-tolerance tick and returns how long the streak lasts.
    fn extend_streak(&mut self, now: Instant) -> Duration {
        let started = *self.window_start.get_or_insert(now);
        self.consecutive_inside_frames = self.consecutive_inside_frames.saturating_add(1);
        now.saturating_duration_since(started)
    }
}

/// Lock state machine over an ordered target sequence.
#[derive(Debug, Clone, Default)]
pub struct SustainTracker {
    policy: LockPolicy,
    targets: Vec<f32>,
    states: Vec<TrackerState>,
}

impl SustainTracker {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            policy,
            targets: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    /// Discards all state and adopts a new target sequence.
    pub fn reset(&mut self, targets: &[Target]) {
        self.targets = targets.iter().map(|t| t.frequency).collect();
        self.states = vec![TrackerState::default(); targets.len()];
    }

    /// Feeds one tick and returns the targets locked afterwards.
    ///
    /// `now` must not go backwards between calls. A target sequence that
    /// differs from the previous call resets every tracker first.
    pub fn update(&mut self, now: Instant, frequency: Option<f32>, targets: &[Target]) -> LockedSet {
        if !self.tracks(targets) {
            debug!("[SUSTAIN] Target sequence changed, resetting {} tracker(s)", targets.len());
            self.reset(targets);
        }

        let frequency = frequency.filter(|f| f.is_finite() && *f > 0.0);
        match self.policy {
            LockPolicy::Hysteresis { tolerance_hz, required_frames, sustain } => {
                self.update_hysteresis(now, frequency, tolerance_hz, required_frames, sustain)
            }
            LockPolicy::Timer { tolerance_hz, sustain } => self.update_timer(now, frequency, tolerance_hz, sustain),
        }

        self.locked()
    }

    /// Targets currently locked. Reading does not change any state.
    pub fn locked(&self) -> LockedSet {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.locked)
            .map(|(i, _)| TargetId(i))
            .collect()
    }

    pub fn states(&self) -> &[TrackerState] {
        &self.states
    }

    pub fn state(&self, id: TargetId) -> Option<&TrackerState> {
        self.states.get(id.0)
    }

    fn tracks(&self, targets: &[Target]) -> bool {
        self.targets.len() == targets.len()
            && self
                .targets
                .iter()
                .zip(targets)
                .all(|(&tracked, target)| tracked.to_bits() == target.frequency.to_bits())
    }

    fn update_hysteresis(
        &mut self,
        now: Instant,
        frequency: Option<f32>,
        tolerance_hz: f32,
        required_frames: u32,
        sustain: Duration,
    ) {
        let unlock_threshold = tolerance_hz * UNLOCK_FACTOR;

        for (i, (state, &target)) in self.states.iter_mut().zip(&self.targets).enumerate() {
            let diff = frequency.map(|f| (f - target).abs());

            if state.locked {
                // Silence keeps the lock; only a clear drift releases it.
                if diff.is_some_and(|d| d > unlock_threshold) {
                    debug!("[SUSTAIN] Target {} unlocked ({} Hz)", i, target);
                    *state = TrackerState::default();
                }
                continue;
            }

            match diff {
                Some(d) if d <= tolerance_hz => {
                    let held = state.extend_streak(now);
                    if held >= sustain && state.consecutive_inside_frames >= required_frames {
                        debug!("[SUSTAIN] Target {} locked ({} Hz)", i, target);
                        state.locked = true;
                    }
                }
                _ => state.break_streak(),
            }
        }
    }

    fn update_timer(&mut self, now: Instant, frequency: Option<f32>, tolerance_hz: f32, sustain: Duration) {
        // Only one timer runs at a time: the nearest unlocked target in tolerance.
        let candidate = frequency.and_then(|f| {
            self.targets
                .iter()
                .zip(&self.states)
                .enumerate()
                .filter(|(_, (_, state))| !state.locked)
                .map(|(i, (&target, _))| (i, (f - target).abs()))
                .filter(|&(_, diff)| diff <= tolerance_hz)
                .fold(None, |best: Option<(usize, f32)>, (i, diff)| match best {
                    Some((_, best_diff)) if best_diff <= diff => best,
                    _ => Some((i, diff)),
                })
                .map(|(i, _)| i)
        });

        for (i, state) in self.states.iter_mut().enumerate() {
            if state.locked {
                continue;
            }
            if Some(i) != candidate {
                state.break_streak();
                continue;
            }
            if state.extend_streak(now) >= sustain {
                debug!("[SUSTAIN] Target {} locked by timer", i);
                state.locked = true;
            }
        }
    }
}
