//! Command-line parsing, audio settings snapshots, and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_BUFFER_MS, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_SECONDS,
    DEFAULT_CLASSIFIER_SENSITIVITY, DEFAULT_DENOISE_LEVEL, DEFAULT_NOISE_GATE,
    DEFAULT_SAMPLE_RATE, DEFAULT_VAD_AGGRESSIVENESS, DEFAULT_VAD_THRESHOLD, DEFAULT_VOICE_BIAS,
    MAX_NOISE_GATE, MAX_VAD_AGGRESSIVENESS, MIN_VAD_THRESHOLD,
};

/// CLI options for the `voicegate` chunk analyzer.
#[derive(Debug, Parser, Clone)]
#[command(
    about = "VoiceGate: denoise, score, and silence-trim 16-bit mono WAV recordings",
    author,
    version
)]
pub struct AppConfig {
    /// WAV file to analyze (16-bit PCM, mono)
    pub input: PathBuf,

    /// Write the trimmed audio of every kept chunk to this WAV file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// YAML or JSON file holding audio settings
    #[arg(long, env = "VOICEGATE_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Capture buffer size fed to the streaming pipeline (milliseconds)
    #[arg(long = "buffer-ms", default_value_t = DEFAULT_BUFFER_MS)]
    pub buffer_ms: u64,

    /// Chunk length handed to the silence trimmer (seconds)
    #[arg(long = "chunk-seconds", default_value_t = DEFAULT_CHUNK_SECONDS)]
    pub chunk_seconds: u64,

    /// Amplitude threshold for trimming (overrides the settings file)
    #[arg(long = "trim-threshold")]
    pub trim_threshold: Option<i32>,

    /// Aggressiveness 0-3 for trimming (overrides the settings file)
    #[arg(long = "trim-aggressiveness")]
    pub trim_aggressiveness: Option<u8>,

    /// Minimum speech run kept by the trimmer (milliseconds)
    #[arg(long = "min-speech-ms")]
    pub min_speech_ms: Option<u64>,

    /// Silence needed to close a speech run (milliseconds)
    #[arg(long = "min-silence-ms")]
    pub min_silence_ms: Option<u64>,

    /// Padding kept around each speech run (milliseconds)
    #[arg(long = "padding-ms")]
    pub padding_ms: Option<u64>,

    /// Coalesce overlapping padded windows instead of copying them twice
    #[arg(long = "merge-padding", default_value_t = false)]
    pub merge_padding: bool,

    /// Recording start (RFC 3339) used to anchor speech windows in UTC
    #[arg(long = "session-start")]
    pub session_start: Option<String>,

    /// Pretty-print the JSON report
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Enable JSON trace logging
    #[arg(long = "logs", env = "VOICEGATE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all trace logging (overrides --logs)
    #[arg(long = "no-logs", env = "VOICEGATE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

/// Snapshot of the user-tunable audio settings.
///
/// A snapshot is read-only while a buffer is being processed; callers swap in
/// a new one between buffers. Out-of-range values are clamped by
/// [`AudioSettings::clamped`], never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Amplitude threshold in 16-bit sample units.
    pub vad_threshold: i32,
    pub vad_aggressiveness: u8,
    /// Minimum chunk peak (fraction of full scale) before a chunk is kept.
    pub noise_gate: f32,
    /// Shifts the classifier decision boundary; 0.5 is neutral.
    pub voice_bias: f32,
    /// Spectral gate strength.
    pub denoise_level: f32,
    /// Voice probability below which a buffer is flagged as skippable.
    pub classifier_sensitivity: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            vad_threshold: DEFAULT_VAD_THRESHOLD,
            vad_aggressiveness: DEFAULT_VAD_AGGRESSIVENESS,
            noise_gate: DEFAULT_NOISE_GATE,
            voice_bias: DEFAULT_VOICE_BIAS,
            denoise_level: DEFAULT_DENOISE_LEVEL,
            classifier_sensitivity: DEFAULT_CLASSIFIER_SENSITIVITY,
        }
    }
}

/// Tunables for one continuous capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sample_rate: u32,
    pub buffer_ms: u64,
    pub chunk_seconds: u64,
    pub channel_capacity: usize,
    /// Explicit trimming parameters; `None` derives them from the settings snapshot.
    pub trim: Option<crate::audio::TrimConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_ms: DEFAULT_BUFFER_MS,
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            trim: None,
        }
    }
}

impl SessionConfig {
    pub fn buffer_samples(&self) -> usize {
        ((u64::from(self.sample_rate) * self.buffer_ms) / 1000).max(1) as usize
    }

    pub fn chunk_samples(&self) -> usize {
        (u64::from(self.sample_rate) * self.chunk_seconds).max(1) as usize
    }
}
