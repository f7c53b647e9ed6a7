use std::f32::consts::PI;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use voicegate::audio::offline_session_from_pcm;
use voicegate::config::{
    AudioSettings, SessionConfig, DEFAULT_BUFFER_MS, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_CHUNK_SECONDS, DEFAULT_SAMPLE_RATE,
};

/// Synthetic benchmark harness for the capture and trim path.
#[derive(Debug, Parser)]
#[command(about = "Benchmark the voice pipeline and silence trimmer with synthetic clips")]
struct Args {
    /// Human-friendly label recorded in the output metrics
    #[arg(long, default_value = "clip")]
    label: String,

    /// Duration of the synthetic speech segment (milliseconds)
    #[arg(long, default_value_t = 2_000)]
    speech_ms: u64,

    /// Duration of silence before and after speech (milliseconds)
    #[arg(long, default_value_t = 1_000)]
    silence_ms: u64,

    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    #[arg(long = "buffer-ms", default_value_t = DEFAULT_BUFFER_MS)]
    buffer_ms: u64,

    #[arg(long = "chunk-seconds", default_value_t = DEFAULT_CHUNK_SECONDS)]
    chunk_seconds: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    ensure_args_supported(&args)?;
    let clip = synthesize_clip(args.speech_ms, args.silence_ms, args.sample_rate);
    let config = SessionConfig {
        sample_rate: args.sample_rate,
        buffer_ms: args.buffer_ms,
        chunk_seconds: args.chunk_seconds,
        channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        trim: None,
    };

    let started = Instant::now();
    let session = offline_session_from_pcm(&clip, &config, &AudioSettings::default(), Utc::now());
    let elapsed_ms = started.elapsed().as_millis();

    let segments: usize = session.kept().map(|chunk| chunk.trim.segments.len()).sum();
    let kept_samples: usize = session.kept().map(|chunk| chunk.trim.kept_samples).sum();
    println!(
        "voice_metrics|label={}|capture_ms={}|buffers_processed={}|buffers_skipped={}|buffers_voiced={}|chunks={}|segments={}|kept_samples={}|mean_probability={:.3}|elapsed_ms={}|stop={}",
        args.label,
        session.metrics.capture_ms,
        session.metrics.buffers_processed,
        session.metrics.buffers_flagged_skip,
        session.metrics.buffers_voiced,
        session.metrics.chunks_emitted,
        segments,
        kept_samples,
        session.metrics.mean_voice_probability,
        elapsed_ms,
        session.metrics.stop_reason.label()
    );

    Ok(())
}

fn ensure_args_supported(args: &Args) -> Result<()> {
    if args.sample_rate == 0 {
        bail!("--sample-rate must be greater than zero");
    }
    if args.buffer_ms == 0 || args.chunk_seconds == 0 {
        bail!("--buffer-ms and --chunk-seconds must be greater than zero");
    }
    Ok(())
}

/// Silence, a voiced 200 Hz harmonic stack, then silence again.
fn synthesize_clip(speech_ms: u64, silence_ms: u64, sample_rate: u32) -> Vec<i16> {
    let speech_samples = (speech_ms * u64::from(sample_rate) / 1000) as usize;
    let silence_samples = (silence_ms * u64::from(sample_rate) / 1000) as usize;
    let mut samples = vec![0i16; silence_samples];
    for n in 0..speech_samples {
        let t = n as f32 / sample_rate as f32;
        let voiced = (2.0 * PI * 200.0 * t).sin()
            + 0.5 * (2.0 * PI * 400.0 * t).sin()
            + 0.25 * (2.0 * PI * 600.0 * t).sin();
        samples.push((voiced * 9_000.0) as i16);
    }
    samples.extend(std::iter::repeat_n(0, silence_samples));
    samples
}
