//! # Audio Source Module
//!
//! The engine never talks to a device directly. It pulls fixed-size
//! [`AudioFrame`]s from an [`AudioSource`], which may be a microphone
//! (see `capture`, behind the `capture` feature), a synthetic tone, a file
//! decoded by the front-end, or a scripted list of frames in tests.

use std::collections::VecDeque;
use std::f64::consts::TAU;

/// Audio buffer size for processing frames.
///
/// Larger buffers give the autocorrelation more periods to work with but
/// increase latency. 2048 samples is ~46ms at 44.1kHz.
pub const BUFFER_SIZE: usize = 2048;

/// One analysis window of mono samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    /// Sample rate in Hz. Zero marks a degenerate frame.
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Anything that can hand the session its next frame.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    /// Returns the latest full window, or `None` if none is available yet.
    fn next_frame(&mut self) -> Option<AudioFrame>;

    /// True once the source can never produce another frame.
    fn is_finished(&self) -> bool {
        false
    }

    /// Releases any underlying device. Called when the session stops.
    fn close(&mut self) {}
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        (**self).next_frame()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Keeps the most recent `capacity` samples of a chunked stream.
///
/// Device callbacks deliver chunks of arbitrary size; the tick wants a
/// fixed window of the newest audio.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
    /// Samples pushed since the last `take_fresh`.
    fresh: usize,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            fresh: 0,
        }
    }

    pub fn push(&mut self, chunk: &[f32]) {
        // Only the tail of an oversized chunk can survive.
        let chunk = &chunk[chunk.len().saturating_sub(self.capacity)..];
        let overflow = (self.samples.len() + chunk.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(chunk.iter().copied());
        self.fresh += chunk.len();
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.fresh = 0;
    }

    /// Number of samples pushed since the window was last taken.
    pub fn fresh(&self) -> usize {
        self.fresh
    }

    /// Copies the window out, oldest sample first. `None` until full.
    pub fn snapshot(&self) -> Option<Vec<f32>> {
        self.is_full().then(|| self.samples.iter().copied().collect())
    }

    /// Like `snapshot`, but only if new samples arrived since the last take.
    pub fn take_fresh(&mut self) -> Option<Vec<f32>> {
        if self.fresh == 0 {
            return None;
        }
        let window = self.snapshot()?;
        self.fresh = 0;
        Some(window)
    }
}

/// Synthetic sine source, handy for demos and tests.
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    buffer_size: usize,
    hop: usize,
    position: u64,
}

impl ToneSource {
    /// Creates a tone that advances by a full buffer per frame.
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32, buffer_size: usize) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            buffer_size,
            hop: buffer_size,
            position: 0,
        }
    }

    /// Samples to advance between consecutive frames.
    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop;
        self
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Changes pitch from the next frame on. Phase is not preserved.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }
}

impl AudioSource for ToneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        if self.sample_rate == 0 {
            return None;
        }
        let rate = self.sample_rate as f64;
        let samples = (0..self.buffer_size as u64)
            .map(|i| {
                let t = (self.position + i) as f64 / rate;
                self.amplitude * (TAU * self.frequency as f64 * t).sin() as f32
            })
            .collect();
        self.position += self.hop as u64;
        Some(AudioFrame::new(samples, self.sample_rate))
    }
}

/// Plays back a fixed list of frames, then finishes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    sample_rate: u32,
    frames: VecDeque<AudioFrame>,
    closed: bool,
}

impl ScriptedSource {
    pub fn new(sample_rate: u32, frames: impl IntoIterator<Item = AudioFrame>) -> Self {
        Self {
            sample_rate,
            frames: frames.into_iter().collect(),
            closed: false,
        }
    }

    pub fn push(&mut self, frame: AudioFrame) {
        self.frames.push_back(frame);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl AudioSource for ScriptedSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        if self.closed {
            return None;
        }
        self.frames.pop_front()
    }

    fn is_finished(&self) -> bool {
        self.closed || self.frames.is_empty()
    }

    fn close(&mut self) {
        self.closed = true;
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_buffer_keeps_newest() {
        let mut buffer = RollingBuffer::new(4);
        buffer.push(&[1.0, 2.0]);
        assert_eq!(buffer.snapshot(), None);
        buffer.push(&[3.0, 4.0, 5.0]);
        assert_eq!(buffer.snapshot(), Some(vec![2.0, 3.0, 4.0, 5.0]));
        buffer.push(&[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(buffer.snapshot(), Some(vec![8.0, 9.0, 10.0, 11.0]));
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_rolling_buffer_take_fresh() {
        let mut buffer = RollingBuffer::new(4);
        buffer.push(&[1.0, 2.0, 3.0]);
        assert_eq!(buffer.take_fresh(), None);
        assert_eq!(buffer.fresh(), 3);

        buffer.push(&[4.0]);
        assert_eq!(buffer.take_fresh(), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(buffer.fresh(), 0);
        // Nothing new arrived: the same window is not handed out twice.
        assert_eq!(buffer.take_fresh(), None);
        assert!(buffer.snapshot().is_some());

        buffer.push(&[5.0]);
        assert_eq!(buffer.take_fresh(), Some(vec![2.0, 3.0, 4.0, 5.0]));

        buffer.push(&[6.0]);
        buffer.clear();
        assert_eq!(buffer.fresh(), 0);
    }

    #[test]
    fn test_tone_source_frames() {
        let mut tone = ToneSource::new(441.0, 0.5, 44100, 256).with_hop(100);
        let first = tone.next_frame().unwrap();
        let second = tone.next_frame().unwrap();
        assert_eq!(first.len(), 256);
        assert_eq!(first.sample_rate, 44100);
        // The second frame starts `hop` samples later.
        assert!((first.samples[100] - second.samples[0]).abs() < 1e-5);
        assert!(first.samples.iter().all(|s| s.abs() <= 0.5 + 1e-6));
    }

    #[test]
    fn test_scripted_source_finishes() {
        let mut source = ScriptedSource::new(8000, vec![AudioFrame::new(vec![0.0; 4], 8000)]);
        assert!(!source.is_finished());
        assert!(source.next_frame().is_some());
        assert!(source.is_finished());
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_scripted_source_close() {
        let mut source = ScriptedSource::new(8000, vec![AudioFrame::new(vec![0.0; 4], 8000)]);
        source.close();
        assert!(source.is_closed());
        assert!(source.next_frame().is_none());
    }
}
