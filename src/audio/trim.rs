//! Offline speech segmentation and trimming for one finalized chunk.
//!
//! Detection runs as a chain of strategies: frame energy with zero-crossing
//! gating first, per-sample amplitude thresholding second. The first strategy
//! that yields any segment wins.

use super::codec::{PcmCodec, WavCodec};
use crate::config::{AudioSettings, MAX_VAD_AGGRESSIVENESS, MIN_VAD_THRESHOLD};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::debug;

/// Canonical RIFF/WAVE header size; anything not longer carries no audio.
pub const WAV_HEADER_BYTES: usize = 44;

const FRAME_MS: u64 = 30;
const HOP_MS: u64 = 15;
const PRE_EMPHASIS: f32 = 0.97;
const ENERGY_FACTOR: f32 = 2.5;
const MIN_FRAME_ENERGY: f32 = 5_000.0;
const MIN_ZCR: f32 = 0.01;
const MAX_ZCR: f32 = 0.25;
const NOISE_FLOOR_DECAY: f32 = 0.9;

/// Trimming parameters for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Amplitude threshold; values below 500 are raised to 500.
    pub threshold: i32,
    pub min_speech_ms: u64,
    pub min_silence_ms: u64,
    pub padding_ms: u64,
    /// 0..=3, scales the frame energy threshold.
    pub aggressiveness: u8,
    /// Coalesce overlapping padded windows so no audio is copied twice.
    pub merge_overlapping_padding: bool,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            threshold: 1_200,
            min_speech_ms: 250,
            min_silence_ms: 350,
            padding_ms: 150,
            aggressiveness: 2,
            merge_overlapping_padding: false,
        }
    }
}

impl From<&AudioSettings> for TrimConfig {
    fn from(settings: &AudioSettings) -> Self {
        Self {
            threshold: settings.vad_threshold,
            aggressiveness: settings.vad_aggressiveness,
            ..Self::default()
        }
    }
}

/// Detected speech, in milliseconds from the start of the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SpeechSegment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Trimmed audio plus the segments it was cut from.
///
/// Segment times describe detected speech before padding, so they are not
/// sample-aligned with `samples`, which holds the padded windows. A segment
/// still open when the chunk ends stops at its last speech frame, not at the
/// final sample, so trailing silence never stretches the last window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrimResult {
    pub kept_samples: usize,
    pub segments: Vec<SpeechSegment>,
    pub samples: Vec<i16>,
}

impl TrimResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Inclusive sample-index span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SampleSegment {
    start: usize,
    end: usize,
}

struct Detection<'a> {
    samples: &'a [i16],
    sample_rate: u32,
    threshold: i32,
    min_speech_samples: usize,
    min_silence_ms: u64,
    energy_multiplier: f32,
}

impl Detection<'_> {
    fn ms_to_samples(&self, ms: u64) -> usize {
        (ms * u64::from(self.sample_rate) / 1000) as usize
    }

    fn ms_to_samples_ceil(&self, ms: u64) -> usize {
        (ms * u64::from(self.sample_rate)).div_ceil(1000) as usize
    }
}

trait SegmentStrategy {
    fn name(&self) -> &'static str;
    fn detect(&self, input: &Detection<'_>) -> Vec<SampleSegment>;
}

const STRATEGIES: &[&dyn SegmentStrategy] = &[&FrameEnergy, &AmplitudeGate];

/// Pre-emphasized frame energy with a self-updating noise floor and a
/// zero-crossing band-pass.
struct FrameEnergy;

impl SegmentStrategy for FrameEnergy {
    fn name(&self) -> &'static str {
        "frame_energy"
    }

    fn detect(&self, input: &Detection<'_>) -> Vec<SampleSegment> {
        let samples = input.samples;
        let frame = input.ms_to_samples(FRAME_MS).max(1);
        let hop = input.ms_to_samples(HOP_MS).max(1);
        if samples.len() < frame {
            return Vec::new();
        }

        let threshold = input.threshold as f32;
        let mut noise_floor = threshold * threshold;
        let mut flags = Vec::with_capacity((samples.len() - frame) / hop + 1);
        let mut offset = 0;
        while offset + frame <= samples.len() {
            let energy = frame_energy(samples, offset, frame);
            let zcr = zero_crossing_rate(&samples[offset..offset + frame]);
            let gate = MIN_FRAME_ENERGY.max(noise_floor * ENERGY_FACTOR * input.energy_multiplier);
            let speech = energy > gate && (MIN_ZCR..=MAX_ZCR).contains(&zcr);
            if !speech {
                noise_floor = NOISE_FLOOR_DECAY * noise_floor + (1.0 - NOISE_FLOOR_DECAY) * energy;
            }
            flags.push(speech);
            offset += hop;
        }

        // Close a run at the first silent frame starting min-silence past the
        // last speech frame's end.
        let min_silence_samples = input.ms_to_samples_ceil(input.min_silence_ms).max(1);
        let last_index = samples.len() - 1;
        let mut segments = Vec::new();
        let mut close = |first: usize, last: usize| {
            let start = first * hop;
            let end = (last * hop + frame).min(last_index);
            if end.saturating_sub(start) >= input.min_speech_samples {
                segments.push(SampleSegment { start, end });
            }
        };

        let mut run_start: Option<usize> = None;
        let mut last_speech = 0;
        for (idx, &speech) in flags.iter().enumerate() {
            if speech {
                run_start.get_or_insert(idx);
                last_speech = idx;
            } else if let Some(first) = run_start {
                if idx * hop >= last_speech * hop + frame + min_silence_samples {
                    close(first, last_speech);
                    run_start = None;
                }
            }
        }
        if let Some(first) = run_start {
            close(first, last_speech);
        }
        segments
    }
}

/// Per-sample `|x| >= threshold` with the same speech/silence gating in samples.
struct AmplitudeGate;

impl SegmentStrategy for AmplitudeGate {
    fn name(&self) -> &'static str {
        "amplitude"
    }

    fn detect(&self, input: &Detection<'_>) -> Vec<SampleSegment> {
        let min_silence_samples = input.ms_to_samples_ceil(input.min_silence_ms).max(1);
        let mut segments = Vec::new();
        let mut speaking = false;
        let mut start = 0;
        let mut last_speech = 0;
        let mut silent_samples = 0;

        for (idx, &sample) in input.samples.iter().enumerate() {
            if i32::from(sample).abs() >= input.threshold {
                if !speaking {
                    speaking = true;
                    start = idx;
                }
                last_speech = idx;
                silent_samples = 0;
            } else if speaking {
                silent_samples += 1;
                if silent_samples >= min_silence_samples {
                    let end = last_speech.max(start);
                    if end - start >= input.min_speech_samples {
                        segments.push(SampleSegment { start, end });
                    }
                    speaking = false;
                    silent_samples = 0;
                }
            }
        }
        if speaking {
            let end = last_speech.max(start);
            if end - start >= input.min_speech_samples {
                segments.push(SampleSegment { start, end });
            }
        }
        segments
    }
}

fn frame_energy(samples: &[i16], start: usize, len: usize) -> f32 {
    let mut prev = f32::from(samples[start.checked_sub(1).unwrap_or(start)]);
    let mut energy = 0.0f32;
    for &sample in &samples[start..start + len] {
        let current = f32::from(sample);
        let emphasized = current - PRE_EMPHASIS * prev;
        energy += emphasized * emphasized;
        prev = current;
    }
    energy / len as f32
}

fn zero_crossing_rate(frame: &[i16]) -> f32 {
    let crossings = frame
        .windows(2)
        .filter(|pair| (pair[0] < 0) != (pair[1] < 0))
        .count();
    crossings as f32 / frame.len().max(1) as f32
}

/// Stateless trimmer; safe to share across worker threads.
#[derive(Debug, Clone, Default)]
pub struct SilenceTrimmer {
    config: TrimConfig,
}

impl SilenceTrimmer {
    pub fn new(config: TrimConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrimConfig {
        &self.config
    }

    /// Segment and trim one complete chunk. Degenerate input yields an empty result.
    pub fn trim(&self, samples: &[i16], sample_rate: u32) -> TrimResult {
        if samples.is_empty() || sample_rate == 0 {
            return TrimResult::empty();
        }
        let config = &self.config;
        let aggressiveness = config.aggressiveness.min(MAX_VAD_AGGRESSIVENESS);
        let min_speech_samples =
            ((config.min_speech_ms * u64::from(sample_rate) / 1000) as usize).max(1);
        let input = Detection {
            samples,
            sample_rate,
            threshold: config.threshold.max(MIN_VAD_THRESHOLD),
            min_speech_samples,
            min_silence_ms: config.min_silence_ms,
            energy_multiplier: 1.0 + f32::from(aggressiveness) * 0.4,
        };

        let Some((strategy, segments)) = STRATEGIES.iter().find_map(|strategy| {
            let segments = strategy.detect(&input);
            (!segments.is_empty()).then(|| (strategy.name(), segments))
        }) else {
            debug!(samples = samples.len(), "no speech detected");
            return TrimResult::empty();
        };
        debug!(
            strategy,
            segments = segments.len(),
            samples = samples.len(),
            "speech segments detected"
        );

        let pad = input.ms_to_samples(config.padding_ms);
        let windows = padded_windows(
            &segments,
            samples.len(),
            pad,
            config.merge_overlapping_padding,
        );
        let total = windows.iter().map(|(start, end)| end - start + 1).sum();
        let mut kept = Vec::with_capacity(total);
        for &(start, end) in &windows {
            kept.extend_from_slice(&samples[start..=end]);
        }

        let to_ms = |idx: usize| idx as u64 * 1000 / u64::from(sample_rate);
        TrimResult {
            kept_samples: kept.len(),
            segments: segments
                .iter()
                .map(|segment| SpeechSegment {
                    start_ms: to_ms(segment.start),
                    end_ms: to_ms(segment.end),
                })
                .collect(),
            samples: kept,
        }
    }

    /// Trim an encoded WAV chunk. Header-only input is an empty result, not an error.
    pub fn trim_wav_bytes(&self, bytes: &[u8]) -> Result<TrimResult> {
        if bytes.len() <= WAV_HEADER_BYTES {
            return Ok(TrimResult::empty());
        }
        let decoded = WavCodec.decode(bytes)?;
        Ok(self.trim(&decoded.samples, decoded.sample_rate))
    }

    pub fn trim_wav_file(&self, path: &Path) -> Result<TrimResult> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read chunk '{}'", path.display()))?;
        self.trim_wav_bytes(&bytes)
            .with_context(|| format!("failed to trim chunk '{}'", path.display()))
    }
}

fn padded_windows(
    segments: &[SampleSegment],
    len: usize,
    pad: usize,
    merge: bool,
) -> Vec<(usize, usize)> {
    let last_index = len.saturating_sub(1);
    let mut windows: Vec<(usize, usize)> = Vec::with_capacity(segments.len());
    for segment in segments {
        let start = segment.start.saturating_sub(pad);
        let end = (segment.end + pad).min(last_index);
        match windows.last_mut() {
            Some(previous) if merge && start <= previous.1 => previous.1 = previous.1.max(end),
            _ => windows.push((start, end)),
        }
    }
    windows
}
