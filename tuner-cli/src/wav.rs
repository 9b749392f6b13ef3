//! # WAV File Source
//!
//! Plays a WAV file through the tuner as if it were live input: each tick
//! advances by one tick's worth of audio and hands over the newest window.

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use tuner_core::{AudioFrame, AudioSource};

pub struct WavSource {
    samples: Vec<f32>,
    sample_rate: u32,
    buffer_size: usize,
    hop: usize,
    position: usize,
}

impl WavSource {
    /// Decodes the whole file and mixes it down to mono.
    ///
    /// # Arguments
    /// * `path` - WAV file to read
    /// * `buffer_size` - Samples per frame
    /// * `tick_ms` - Playback advance per frame in milliseconds
    pub fn open(path: &Path, buffer_size: usize, tick_ms: u64) -> Result<Self> {
        let mut reader = WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 || spec.channels == 0 {
            bail!("{} has an invalid format", path.display());
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let channels = spec.channels as usize;
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let hop = ((spec.sample_rate as u64 * tick_ms) / 1000).max(1) as usize;
        tracing::info!(
            "[WAV] Loaded {} ({} Hz, {} channel(s), {:.1}s)",
            path.display(),
            spec.sample_rate,
            channels,
            samples.len() as f32 / spec.sample_rate as f32
        );

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            buffer_size,
            hop,
            position: 0,
        })
    }
}

impl AudioSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        let end = self.position.checked_add(self.buffer_size)?;
        let window = self.samples.get(self.position..end)?;
        let frame = AudioFrame::new(window.to_vec(), self.sample_rate);
        self.position += self.hop;
        Some(frame)
    }

    fn is_finished(&self) -> bool {
        self.position + self.buffer_size > self.samples.len()
    }

    fn close(&mut self) {
        self.samples.clear();
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn test_reads_stereo_int_file() {
        let path = std::env::temp_dir().join(format!("tuner-wav-{}.wav", std::process::id()));
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..8000 {
            let v = ((i as f32 * 0.05).sin() * 16000.0) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        // 100 ms per tick at 8 kHz is an 800 sample hop.
        let mut source = WavSource::open(&path, 1024, 100).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(source.sample_rate(), 8000);
        let mut frames = 0;
        while let Some(frame) = source.next_frame() {
            assert_eq!(frame.len(), 1024);
            assert!(frame.samples.iter().all(|s| s.abs() <= 0.5));
            frames += 1;
        }
        assert_eq!(frames, 9);
        assert!(source.is_finished());
    }
}
