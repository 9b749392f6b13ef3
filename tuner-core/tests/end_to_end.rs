//! Full session runs over synthetic tones.

use std::time::{Duration, Instant};

use tuner_core::audio::ToneSource;
use tuner_core::sustain::TrackerPhase;
use tuner_core::{LockPolicyKind, Target, TargetId, TunerConfig, TuningSession};

fn config(policy: LockPolicyKind) -> TunerConfig {
    TunerConfig {
        tolerance_hz: 2.0,
        required_frames: 5,
        sustain_ms: 500,
        lock_policy: policy,
        ..TunerConfig::default()
    }
}

#[test]
fn locks_on_sustained_note_and_releases_on_octave_jump() {
    let source = ToneSource::new(110.0, 0.5, 44100, 2048);
    let mut session = TuningSession::new(source, config(LockPolicyKind::Hysteresis)).unwrap();
    session.set_targets(vec![Target::new("A2", 110.0)]);

    let base = Instant::now();
    let mut now = base;
    for _ in 0..6 {
        let output = session.tick(now);
        assert!(output.frequency_hz.is_some());
        now += Duration::from_millis(100);
    }
    let output = session.last_output().clone();
    assert!(output.locked_targets.contains(TargetId(0)));
    assert_eq!(output.note.as_deref(), Some("A2"));
    assert_eq!(session.tracker().states()[0].phase(), TrackerPhase::Locked);

    // Jump an octave: 110 Hz away from the target, far past 1.5 x 2 Hz.
    session.source_mut().unwrap().set_frequency(220.0);
    let output = session.tick(now);
    assert!(output.frequency_hz.unwrap() > 200.0);
    assert!(output.locked_targets.is_empty());
    assert_eq!(session.tracker().states()[0].phase(), TrackerPhase::Searching);
}

#[test]
fn short_streak_never_locks() {
    let source = ToneSource::new(110.0, 0.5, 44100, 2048);
    let mut session = TuningSession::new(source, config(LockPolicyKind::Hysteresis)).unwrap();
    session.set_targets(vec![Target::new("A2", 110.0)]);

    let base = Instant::now();
    for tick in 0..10 {
        let output = session.tick(base + Duration::from_millis(tick * 20));
        assert!(output.locked_targets.is_empty());
    }
}

#[test]
fn timer_policy_locks_string_permanently() {
    let source = ToneSource::new(146.83, 0.5, 44100, 2048);
    let mut session = TuningSession::new(source, config(LockPolicyKind::Timer)).unwrap();
    session.select_instrument("guitar").unwrap();

    let base = Instant::now();
    session.tick(base);
    session.tick(base + Duration::from_millis(250));
    assert!(session.last_output().locked_targets.is_empty());
    session.tick(base + Duration::from_millis(500));
    // D3 is the third string of standard tuning.
    assert!(session.last_output().locked_targets.contains(TargetId(2)));

    let silent = session.process_frame(base + Duration::from_millis(600), None);
    assert!(silent.locked_targets.contains(TargetId(2)));

    session.select_instrument("bass").unwrap();
    assert!(session.last_output().locked_targets.is_empty());
}
