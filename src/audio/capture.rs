//! Streaming capture session.
//!
//! Feeds fixed-size buffers through the voice pipeline for live feedback,
//! accumulates the raw audio into chunks, and finalizes each closed chunk
//! with the noise gate and the silence trimmer.

use super::meter::{peak_level, LiveMeter};
use super::pipeline::VoiceProcessingPipeline;
use super::trim::{SilenceTrimmer, TrimConfig, TrimResult};
use super::vad::{VadDecision, VadEngine};
use crate::config::{AudioSettings, SessionConfig};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// Supplies mono 16-bit buffers at a fixed rate.
pub trait CaptureSource {
    fn sample_rate(&self) -> u32;

    /// Fill `buf` with up to `buf.len()` samples. `Ok(0)` means the source is exhausted.
    fn read(&mut self, buf: &mut [i16]) -> Result<usize>;
}

/// Replays an in-memory recording.
#[derive(Debug, Clone)]
pub struct PcmSource {
    samples: Vec<i16>,
    position: usize,
    sample_rate: u32,
}

impl PcmSource {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }
}

impl CaptureSource for PcmSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        let remaining = &self.samples[self.position..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        Ok(count)
    }
}

/// Explains why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    SourceExhausted,
    ManualStop,
    Error(String),
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::SourceExhausted => "source_exhausted",
            StopReason::ManualStop => "manual_stop",
            StopReason::Error(_) => "error",
        }
    }
}

/// Session counters for observability and benchmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetrics {
    pub engine: &'static str,
    pub buffers_processed: usize,
    pub buffers_flagged_skip: usize,
    pub buffers_voiced: usize,
    pub chunks_emitted: usize,
    pub capture_ms: u64,
    pub mean_voice_probability: f32,
    pub stop_reason: StopReason,
}

impl Default for CaptureMetrics {
    fn default() -> Self {
        Self {
            engine: "unknown_vad",
            buffers_processed: 0,
            buffers_flagged_skip: 0,
            buffers_voiced: 0,
            chunks_emitted: 0,
            capture_ms: 0,
            mean_voice_probability: 0.0,
            stop_reason: StopReason::SourceExhausted,
        }
    }
}

/// A closed chunk of raw audio waiting for trimming.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChunk {
    pub index: usize,
    pub chunk_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

/// A trimmed chunk that contains speech.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedChunk {
    pub index: usize,
    pub chunk_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub sample_rate: u32,
    /// Length of the kept (padded) audio.
    pub duration_ms: u64,
    pub trim: TrimResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Kept(FinalizedChunk),
    /// Trimming found no speech.
    Silent { chunk_id: String },
    /// Peak stayed under the noise gate; the trimmer never ran.
    BelowNoiseGate { chunk_id: String, peak: f32 },
}

impl ChunkOutcome {
    pub fn chunk_id(&self) -> &str {
        match self {
            ChunkOutcome::Kept(chunk) => &chunk.chunk_id,
            ChunkOutcome::Silent { chunk_id } | ChunkOutcome::BelowNoiseGate { chunk_id, .. } => {
                chunk_id
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChunkOutcome::Kept(_) => "kept",
            ChunkOutcome::Silent { .. } => "silent",
            ChunkOutcome::BelowNoiseGate { .. } => "below_noise_gate",
        }
    }
}

/// Apply the noise gate, then trim. Runs independently of any session state.
pub fn finalize_chunk(
    chunk: PendingChunk,
    settings: &AudioSettings,
    trimmer: &SilenceTrimmer,
) -> ChunkOutcome {
    let settings = settings.clamped();
    let peak = peak_level(&chunk.samples);
    if peak < settings.noise_gate {
        info!(
            chunk_id = %chunk.chunk_id,
            peak,
            noise_gate = settings.noise_gate,
            "chunk below noise gate"
        );
        return ChunkOutcome::BelowNoiseGate {
            chunk_id: chunk.chunk_id,
            peak,
        };
    }

    let trim = trimmer.trim(&chunk.samples, chunk.sample_rate);
    if trim.is_silent() {
        info!(chunk_id = %chunk.chunk_id, "silent chunk skipped");
        return ChunkOutcome::Silent {
            chunk_id: chunk.chunk_id,
        };
    }

    let duration_ms = samples_to_ms(trim.kept_samples as u64, chunk.sample_rate);
    info!(
        chunk_id = %chunk.chunk_id,
        segments = trim.segments.len(),
        kept_samples = trim.kept_samples,
        duration_ms,
        "chunk finalized"
    );
    ChunkOutcome::Kept(FinalizedChunk {
        index: chunk.index,
        chunk_id: chunk.chunk_id,
        started_at: chunk.started_at,
        ended_at: chunk.ended_at,
        sample_rate: chunk.sample_rate,
        duration_ms,
        trim,
    })
}

fn samples_to_ms(samples: u64, sample_rate: u32) -> u64 {
    samples * 1000 / u64::from(sample_rate.max(1))
}

pub enum CaptureStep {
    /// One buffer was processed; a chunk closes when it reaches its target size.
    Buffer(Option<PendingChunk>),
    Exhausted,
}

/// Owns the per-session voice engine and the chunk being filled.
pub struct CaptureSession {
    engine: Box<dyn VadEngine + Send>,
    settings: AudioSettings,
    meter: Option<LiveMeter>,
    sample_rate: u32,
    chunk_samples: usize,
    started_at: DateTime<Utc>,
    scratch: Vec<i16>,
    active: Vec<i16>,
    active_offset: u64,
    total_samples: u64,
    next_index: usize,
    probability_sum: f64,
    metrics: CaptureMetrics,
}

impl CaptureSession {
    pub fn new(config: &SessionConfig, settings: AudioSettings, started_at: DateTime<Utc>) -> Self {
        let engine = Box::new(VoiceProcessingPipeline::new(config.sample_rate));
        Self::with_engine(config, settings, started_at, engine)
    }

    pub fn with_engine(
        config: &SessionConfig,
        settings: AudioSettings,
        started_at: DateTime<Utc>,
        engine: Box<dyn VadEngine + Send>,
    ) -> Self {
        let chunk_samples = config.chunk_samples();
        let metrics = CaptureMetrics {
            engine: engine.name(),
            ..CaptureMetrics::default()
        };
        Self {
            engine,
            settings: settings.clamped(),
            meter: None,
            sample_rate: config.sample_rate,
            chunk_samples,
            started_at,
            scratch: vec![0; config.buffer_samples()],
            active: Vec::with_capacity(chunk_samples),
            active_offset: 0,
            total_samples: 0,
            next_index: 0,
            probability_sum: 0.0,
            metrics,
        }
    }

    pub fn with_meter(mut self, meter: LiveMeter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Swap in a new settings snapshot; it applies from the next buffer on.
    pub fn update_settings(&mut self, settings: AudioSettings) {
        self.settings = settings.clamped();
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &CaptureMetrics {
        &self.metrics
    }

    /// Read one buffer from `source` and process it completely.
    pub fn capture_next(&mut self, source: &mut dyn CaptureSource) -> Result<CaptureStep> {
        let mut scratch = std::mem::take(&mut self.scratch);
        let read = source.read(&mut scratch);
        let step = match read {
            Ok(0) => Ok(CaptureStep::Exhausted),
            Ok(count) => Ok(CaptureStep::Buffer(self.push_buffer(&scratch[..count]))),
            Err(err) => Err(err),
        };
        self.scratch = scratch;
        step
    }

    /// Process one buffer. Returns a chunk once enough raw audio has accumulated.
    pub fn push_buffer(&mut self, samples: &[i16]) -> Option<PendingChunk> {
        let result = self.engine.process(samples, &self.settings);
        self.metrics.buffers_processed += 1;
        match result.decision() {
            VadDecision::Speech => self.metrics.buffers_voiced += 1,
            VadDecision::Silence => self.metrics.buffers_flagged_skip += 1,
            VadDecision::Uncertain => {}
        }
        self.probability_sum += f64::from(result.voice_probability);
        if let Some(meter) = &self.meter {
            meter.update(result.voice_probability, samples);
        }

        self.active.extend_from_slice(samples);
        self.total_samples += samples.len() as u64;
        if self.active.len() >= self.chunk_samples {
            Some(self.close_chunk())
        } else {
            None
        }
    }

    /// End the session, flushing any partially filled chunk.
    pub fn finish(mut self, reason: StopReason) -> (Option<PendingChunk>, CaptureMetrics) {
        let tail = (!self.active.is_empty()).then(|| self.close_chunk());
        self.metrics.capture_ms = samples_to_ms(self.total_samples, self.sample_rate);
        if self.metrics.buffers_processed > 0 {
            self.metrics.mean_voice_probability =
                (self.probability_sum / self.metrics.buffers_processed as f64) as f32;
        }
        debug!(
            reason = reason.label(),
            buffers = self.metrics.buffers_processed,
            chunks = self.metrics.chunks_emitted,
            "capture session finished"
        );
        self.metrics.stop_reason = reason;
        (tail, self.metrics)
    }

    fn close_chunk(&mut self) -> PendingChunk {
        let samples = std::mem::replace(&mut self.active, Vec::with_capacity(self.chunk_samples));
        let offset_ms = samples_to_ms(self.active_offset, self.sample_rate);
        let len_ms = samples_to_ms(samples.len() as u64, self.sample_rate);
        let started_at = self.started_at + Duration::milliseconds(offset_ms as i64);
        let ended_at = started_at + Duration::milliseconds(len_ms as i64);
        let index = self.next_index;
        self.next_index += 1;
        self.active_offset += samples.len() as u64;
        self.metrics.chunks_emitted += 1;
        PendingChunk {
            index,
            chunk_id: format!("chunk_{index:04}_{}", started_at.format("%Y%m%dT%H%M%S%.3fZ")),
            started_at,
            ended_at,
            sample_rate: self.sample_rate,
            samples,
        }
    }
}

/// Result of running a whole recording through capture and finalization.
#[derive(Debug, Clone)]
pub struct OfflineSession {
    pub outcomes: Vec<ChunkOutcome>,
    pub metrics: CaptureMetrics,
}

impl OfflineSession {
    pub fn kept(&self) -> impl Iterator<Item = &FinalizedChunk> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ChunkOutcome::Kept(chunk) => Some(chunk),
            _ => None,
        })
    }
}

/// Drive a capture session over an in-memory recording on the calling thread.
/// Used by the CLI and the benchmark harness; no device or threads involved.
pub fn offline_session_from_pcm(
    samples: &[i16],
    config: &SessionConfig,
    settings: &AudioSettings,
    started_at: DateTime<Utc>,
) -> OfflineSession {
    let settings = settings.clamped();
    let trim_config = config
        .trim
        .clone()
        .unwrap_or_else(|| TrimConfig::from(&settings));
    let trimmer = SilenceTrimmer::new(trim_config);
    let mut session = CaptureSession::new(config, settings, started_at);
    let mut outcomes = Vec::new();

    for buffer in samples.chunks(config.buffer_samples()) {
        if let Some(chunk) = session.push_buffer(buffer) {
            outcomes.push(finalize_chunk(chunk, &settings, &trimmer));
        }
    }
    let (tail, metrics) = session.finish(StopReason::SourceExhausted);
    if let Some(chunk) = tail {
        outcomes.push(finalize_chunk(chunk, &settings, &trimmer));
    }
    OfflineSession { outcomes, metrics }
}
