//! # Audio Capture Module
//!
//! This module handles real-time microphone capture using CPAL
//! (Cross-Platform Audio Library) and exposes it as an [`AudioSource`].
//!
//! ## Features
//! - Automatic input device and format selection
//! - Mono downmix of multi-channel input
//! - Rolling window of the newest `buffer_size` samples, handed out only
//!   when new audio arrived since the previous tick
//! - A stream error finishes the source
//! - Guaranteed stream release on `close()` and on drop

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::audio::{AudioFrame, AudioSource, RollingBuffer};
use crate::error::TunerError;

/// Preferred capture rate. The closest supported rate is used otherwise.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Microphone input owned by a tuning session.
///
/// The CPAL stream is not `Send` on every platform, so the source must be
/// created on the thread that runs the session.
pub struct CaptureSource {
    stream: Option<cpal::Stream>,
    chunks: Receiver<Vec<f32>>,
    window: RollingBuffer,
    sample_rate: u32,
    /// Set by the stream error callback.
    failed: Arc<AtomicBool>,
}

impl CaptureSource {
    /// Opens the default input device and starts streaming.
    ///
    /// # Returns
    /// * `Ok(source)` - Stream is playing
    /// * `Err(TunerError::CaptureUnavailable)` - No device, no usable
    ///   format, or the stream could not be built/started
    ///
    /// Any partially built stream is dropped before the error returns.
    pub fn open(buffer_size: usize) -> Result<Self, TunerError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| TunerError::CaptureUnavailable("No input device available".into()))?;

        match device.name() {
            Ok(name) => info!("[CAPTURE] Using audio input device: {}", name),
            Err(e) => warn!("[CAPTURE] Input device has no name: {}", e),
        }

        let configs = device
            .supported_input_configs()
            .map_err(unavailable)?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| TunerError::CaptureUnavailable("No suitable f32 input format found".into()))?;

        let rate = TARGET_SAMPLE_RATE.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let sample_rate = config.sample_rate().0;
        let channels = config.channels().max(1) as usize;
        let config: cpal::StreamConfig = config.into();

        info!("[CAPTURE] Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

        let (chunk_tx, chunk_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
        let failed = Arc::new(AtomicBool::new(false));
        let error_flag = Arc::clone(&failed);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| forward_chunk(&chunk_tx, data, channels),
                move |err| {
                    warn!("[CAPTURE] An error occurred on the audio stream: {}", err);
                    error_flag.store(true, Ordering::Release);
                },
                None,
            )
            .map_err(unavailable)?;

        stream.play().map_err(unavailable)?;

        Ok(Self {
            stream: Some(stream),
            chunks: chunk_rx,
            window: RollingBuffer::new(buffer_size),
            sample_rate,
            failed,
        })
    }
}

fn unavailable(e: impl std::fmt::Display) -> TunerError {
    TunerError::CaptureUnavailable(e.to_string())
}

/// Downmixes interleaved input to mono and hands it to the session.
fn forward_chunk(sender: &Sender<Vec<f32>>, data: &[f32], channels: usize) {
    let mono: Vec<f32> = if channels == 1 {
        data.to_vec()
    } else {
        data.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };
    // The receiver is gone once the session stopped; nothing to do then.
    let _ = sender.send(mono);
}

impl AudioSource for CaptureSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        while let Ok(chunk) = self.chunks.try_recv() {
            self.window.push(&chunk);
        }
        self.window
            .take_fresh()
            .map(|samples| AudioFrame::new(samples, self.sample_rate))
    }

    fn is_finished(&self) -> bool {
        self.stream.is_none() || self.failed.load(Ordering::Acquire)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!("[CAPTURE] Stopping stream...");
            if let Err(e) = stream.pause() {
                warn!("[CAPTURE] Error pausing stream: {}", e);
            }
            drop(stream);
        }
        self.window.clear();
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Mono is preferred, then the range
/// closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let in_range = (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate);
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let rate_diff = if in_range { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, rate_diff)
        })
}
