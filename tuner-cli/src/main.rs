//! # Tuner - Headless Instrument Tuner
//!
//! Command-line front-end for `tuner-core`. It runs a tuning session on a
//! synthetic tone, a WAV file or the microphone and prints one line per
//! tick, either human-readable or as JSON.
//!
//! ## Architecture
//! - **Main Thread**: owns the session and its audio source, runs the ticks
//! - **Printer Thread**: subscribed observer writing ticks to stdout
//! - **Logging**: `tracing` to stderr, filtered by `RUST_LOG`

mod wav;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tuner_core::audio::ToneSource;
use tuner_core::instrument::INSTRUMENTS;
use tuner_core::{AudioSource, LockPolicyKind, TickOutput, TunerConfig, TuningSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Synthetic sine at --tone-hz
    Tone,
    /// WAV file given by --wav
    Wav,
    /// Default input device (needs the `capture` feature)
    Mic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Hysteresis,
    Timer,
}

impl From<PolicyArg> for LockPolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Hysteresis => LockPolicyKind::Hysteresis,
            PolicyArg::Timer => LockPolicyKind::Timer,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tuner", version, about = "Headless instrument tuner")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "guitar")]
    instrument: String,

    /// Tuning id, defaults to the instrument's default tuning
    #[arg(long)]
    tuning: Option<String>,

    #[arg(long, value_enum, default_value_t = SourceKind::Tone)]
    source: SourceKind,

    #[arg(long, default_value_t = 110.0)]
    tone_hz: f32,

    #[arg(long)]
    wav: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long, value_parser = parse_seconds)]
    seconds: Option<Duration>,

    #[arg(long)]
    tolerance_hz: Option<f32>,

    #[arg(long)]
    sustain_ms: Option<u64>,

    #[arg(long)]
    required_frames: Option<u32>,

    #[arg(long, value_enum)]
    lock_policy: Option<PolicyArg>,

    /// Print ticks as JSON lines
    #[arg(long)]
    json: bool,

    /// Write the effective config to this path and exit
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// List instruments and tunings and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if cli.list {
        print_catalog();
        return Ok(());
    }

    let config = build_config(&cli)?;
    if let Some(path) = &cli.save_config {
        config
            .save(path)
            .with_context(|| format!("saving config to {}", path.display()))?;
        info!("[MAIN] Config written to {}", path.display());
        return Ok(());
    }

    let source = open_source(&cli, &config)?;
    let mut session = TuningSession::new(source, config)?;
    match &cli.tuning {
        Some(tuning) => session.select_tuning(&cli.instrument, tuning)?,
        None => session.select_instrument(&cli.instrument)?,
    }

    let labels: Vec<String> = session.targets().iter().map(|t| t.label.clone()).collect();
    let json = cli.json;
    let ticks = session.subscribe();
    let printer = thread::spawn(move || -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for output in ticks {
            if json {
                writeln!(out, "{}", serde_json::to_string(&output)?)?;
            } else {
                writeln!(out, "{}", format_tick(&output, &labels))?;
            }
        }
        Ok(())
    });

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    if let Some(duration) = cli.seconds {
        let timer_tx = shutdown_tx.clone();
        thread::spawn(move || {
            thread::sleep(duration);
            let _ = timer_tx.send(());
        });
    }

    session.run(&shutdown_rx);
    drop(shutdown_tx);
    drop(session);

    printer.join().map_err(|_| anyhow!("printer thread panicked"))??;
    info!("[MAIN] Session finished");
    Ok(())
}

/// Parses a finite, non-negative number of seconds.
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|e| format!("invalid number: {}", e))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration {}: {}", value, e))
}

/// Loads the config file if given, then applies flag overrides.
fn build_config(cli: &Cli) -> Result<TunerConfig> {
    let mut config = match &cli.config {
        Some(path) => TunerConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => TunerConfig::default(),
    };
    if let Some(tolerance_hz) = cli.tolerance_hz {
        config.tolerance_hz = tolerance_hz;
    }
    if let Some(sustain_ms) = cli.sustain_ms {
        config.sustain_ms = sustain_ms;
    }
    if let Some(required_frames) = cli.required_frames {
        config.required_frames = required_frames;
    }
    if let Some(policy) = cli.lock_policy {
        config.lock_policy = policy.into();
    }
    config.validate()?;
    Ok(config)
}

fn open_source(cli: &Cli, config: &TunerConfig) -> Result<Box<dyn AudioSource>> {
    match cli.source {
        SourceKind::Tone => {
            let sample_rate = 44100;
            let hop = (sample_rate as u64 * config.tick_interval_ms / 1000).max(1) as usize;
            Ok(Box::new(
                ToneSource::new(cli.tone_hz, 0.5, sample_rate, config.buffer_size).with_hop(hop),
            ))
        }
        SourceKind::Wav => {
            let path = cli.wav.as_ref().ok_or_else(|| anyhow!("--source wav needs --wav <path>"))?;
            Ok(Box::new(wav::WavSource::open(path, config.buffer_size, config.tick_interval_ms)?))
        }
        SourceKind::Mic => open_microphone(config),
    }
}

#[cfg(feature = "capture")]
fn open_microphone(config: &TunerConfig) -> Result<Box<dyn AudioSource>> {
    let source = tuner_core::capture::CaptureSource::open(config.buffer_size)?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "capture"))]
fn open_microphone(_config: &TunerConfig) -> Result<Box<dyn AudioSource>> {
    Err(anyhow!("built without microphone support; rebuild with --features capture"))
}

/// One human-readable line: frequency, note, cents and the string states.
///
/// Strings show as `[E2]` while locked, `<E2>` while in tune and `E2*`
/// once tuned earlier in the session.
fn format_tick(output: &TickOutput, labels: &[String]) -> String {
    let reading = match (output.frequency_hz, &output.note) {
        (Some(freq), Some(note)) => format!(
            "{:>8.2} Hz  {:<4} {:>+7.2} cents",
            freq,
            note,
            output.smoothed_cents.unwrap_or(output.cents_deviation)
        ),
        _ => format!("{:>8} Hz  {:<4} {:>7} cents", "--", "--", "--"),
    };

    let strings: Vec<String> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let id = tuner_core::TargetId(i);
            if output.locked_targets.contains(id) {
                format!("[{}]", label)
            } else if output.nearest_target == Some(id) && output.in_tune {
                format!("<{}>", label)
            } else if output.tuned_targets.contains(id) {
                format!("{}*", label)
            } else {
                label.clone()
            }
        })
        .collect();

    format!("{}  {}", reading, strings.join(" "))
}

fn print_catalog() {
    for instrument in INSTRUMENTS {
        println!("{} ({})", instrument.id, instrument.name);
        for tuning in instrument.tunings {
            let marker = if tuning.id == instrument.default_tuning { "*" } else { " " };
            println!("  {} {:<16} {:<36} {}", marker, tuning.id, tuning.name, tuning.notes.join(" "));
        }
    }
}
