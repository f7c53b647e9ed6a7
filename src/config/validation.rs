use super::defaults::{
    MAX_BUFFER_MS, MAX_CHUNK_SECONDS, MAX_DENOISE_LEVEL, MAX_PADDING_MS, MIN_BUFFER_MS,
    MIN_DENOISE_LEVEL, VOICE_BIAS_RANGE,
};
use super::{
    AppConfig, AudioSettings, SessionConfig, MAX_NOISE_GATE, MAX_VAD_AGGRESSIVENESS,
    MIN_VAD_THRESHOLD,
};
use crate::audio::TrimConfig;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::{fs, path::Path};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values. Unlike settings snapshots, bad CLI input is rejected.
    pub fn validate(&mut self) -> Result<()> {
        if !self.input.is_file() {
            bail!("input '{}' does not exist or is not a file", self.input.display());
        }
        if !(MIN_BUFFER_MS..=MAX_BUFFER_MS).contains(&self.buffer_ms) {
            bail!(
                "--buffer-ms must be between {MIN_BUFFER_MS} and {MAX_BUFFER_MS}, got {}",
                self.buffer_ms
            );
        }
        if !(1..=MAX_CHUNK_SECONDS).contains(&self.chunk_seconds) {
            bail!(
                "--chunk-seconds must be between 1 and {MAX_CHUNK_SECONDS}, got {}",
                self.chunk_seconds
            );
        }
        if let Some(threshold) = self.trim_threshold {
            if !(0..=i32::from(i16::MAX)).contains(&threshold) {
                bail!("--trim-threshold must be between 0 and 32767, got {threshold}");
            }
        }
        if let Some(aggressiveness) = self.trim_aggressiveness {
            if aggressiveness > MAX_VAD_AGGRESSIVENESS {
                bail!(
                    "--trim-aggressiveness must be between 0 and {MAX_VAD_AGGRESSIVENESS}, got {aggressiveness}"
                );
            }
        }
        if let Some(silence) = self.min_silence_ms {
            if silence == 0 {
                bail!("--min-silence-ms must be greater than 0");
            }
        }
        if let Some(padding) = self.padding_ms {
            if padding > MAX_PADDING_MS {
                bail!("--padding-ms must be at most {MAX_PADDING_MS}, got {padding}");
            }
        }
        if let Some(start) = &self.session_start {
            parse_session_start(start)?;
        }
        Ok(())
    }

    /// Load the settings file if one was given, otherwise defaults. Always clamped.
    pub fn audio_settings(&self) -> Result<AudioSettings> {
        match &self.settings {
            Some(path) => AudioSettings::load(path),
            None => Ok(AudioSettings::default()),
        }
    }

    /// Trimming parameters: settings-derived, with CLI overrides layered on top.
    pub fn trim_config(&self, settings: &AudioSettings) -> TrimConfig {
        let mut trim = TrimConfig::from(settings);
        if let Some(threshold) = self.trim_threshold {
            trim.threshold = threshold;
        }
        if let Some(aggressiveness) = self.trim_aggressiveness {
            trim.aggressiveness = aggressiveness;
        }
        if let Some(ms) = self.min_speech_ms {
            trim.min_speech_ms = ms;
        }
        if let Some(ms) = self.min_silence_ms {
            trim.min_silence_ms = ms;
        }
        if let Some(ms) = self.padding_ms {
            trim.padding_ms = ms;
        }
        trim.merge_overlapping_padding = self.merge_padding;
        trim
    }

    /// Session tunables for a recording captured at `sample_rate`.
    pub fn session_config(&self, sample_rate: u32, settings: &AudioSettings) -> SessionConfig {
        SessionConfig {
            sample_rate,
            buffer_ms: self.buffer_ms,
            chunk_seconds: self.chunk_seconds,
            trim: Some(self.trim_config(settings)),
            ..SessionConfig::default()
        }
    }

    pub fn session_start_utc(&self) -> Result<Option<DateTime<Utc>>> {
        self.session_start
            .as_deref()
            .map(parse_session_start)
            .transpose()
    }
}

pub(super) fn parse_session_start(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("--session-start must be an RFC 3339 timestamp, got '{value}'"))
}

impl AudioSettings {
    /// Read a YAML (or JSON) settings file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let settings: AudioSettings = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        Ok(settings.clamped())
    }

    /// Clamp every field into its accepted range. NaN falls back to the default.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        Self {
            vad_threshold: self.vad_threshold.max(MIN_VAD_THRESHOLD),
            vad_aggressiveness: self.vad_aggressiveness.min(MAX_VAD_AGGRESSIVENESS),
            noise_gate: clamp_or(self.noise_gate, 0.0, MAX_NOISE_GATE, defaults.noise_gate),
            voice_bias: clamp_or(
                self.voice_bias,
                VOICE_BIAS_RANGE.0,
                VOICE_BIAS_RANGE.1,
                defaults.voice_bias,
            ),
            denoise_level: clamp_or(
                self.denoise_level,
                MIN_DENOISE_LEVEL,
                MAX_DENOISE_LEVEL,
                defaults.denoise_level,
            ),
            classifier_sensitivity: clamp_or(
                self.classifier_sensitivity,
                0.0,
                1.0,
                defaults.classifier_sensitivity,
            ),
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}
