use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use voicegate::audio::{
    offline_session_from_pcm, read_wav_file, write_wav_file, ChunkOutcome, OfflineSession,
    SpeechSegment,
};
use voicegate::config::AppConfig;
use voicegate::{init_tracing, ArchiveManifest};

#[derive(Debug, Serialize)]
struct Report {
    input: String,
    sample_rate: u32,
    engine: &'static str,
    capture_ms: u64,
    buffers_processed: usize,
    buffers_flagged_skip: usize,
    buffers_voiced: usize,
    mean_voice_probability: f32,
    kept_samples: usize,
    chunks: Vec<ChunkReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<ArchiveManifest>,
}

#[derive(Debug, Serialize)]
struct ChunkReport {
    chunk_id: String,
    outcome: &'static str,
    segments: Vec<SpeechSegment>,
    kept_samples: usize,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak: Option<f32>,
}

impl From<&ChunkOutcome> for ChunkReport {
    fn from(outcome: &ChunkOutcome) -> Self {
        let mut report = ChunkReport {
            chunk_id: outcome.chunk_id().to_string(),
            outcome: outcome.label(),
            segments: Vec::new(),
            kept_samples: 0,
            duration_ms: 0,
            peak: None,
        };
        match outcome {
            ChunkOutcome::Kept(chunk) => {
                report.segments = chunk.trim.segments.clone();
                report.kept_samples = chunk.trim.kept_samples;
                report.duration_ms = chunk.duration_ms;
            }
            ChunkOutcome::BelowNoiseGate { peak, .. } => report.peak = Some(*peak),
            ChunkOutcome::Silent { .. } => {}
        }
        report
    }
}

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_tracing(&config);

    let decoded = read_wav_file(&config.input)?;
    let settings = config.audio_settings()?;
    let session_config = config.session_config(decoded.sample_rate, &settings);
    let anchor = config.session_start_utc()?;
    let session = offline_session_from_pcm(
        &decoded.samples,
        &session_config,
        &settings,
        anchor.unwrap_or_else(Utc::now),
    );
    info!(
        input = %config.input.display(),
        chunks = session.outcomes.len(),
        stop_reason = session.metrics.stop_reason.label(),
        "analysis complete"
    );

    if let Some(path) = &config.output {
        let trimmed: Vec<i16> = session
            .kept()
            .flat_map(|chunk| chunk.trim.samples.iter().copied())
            .collect();
        write_wav_file(path, &trimmed, decoded.sample_rate)?;
    }

    let manifest = anchor.map(|_| {
        let archive_id = config
            .input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        ArchiveManifest::build(archive_id, Utc::now(), session.kept())
    });
    let report = build_report(&config, decoded.sample_rate, &session, manifest);
    let json = if config.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn build_report(
    config: &AppConfig,
    sample_rate: u32,
    session: &OfflineSession,
    manifest: Option<ArchiveManifest>,
) -> Report {
    let metrics = &session.metrics;
    Report {
        input: config.input.display().to_string(),
        sample_rate,
        engine: metrics.engine,
        capture_ms: metrics.capture_ms,
        buffers_processed: metrics.buffers_processed,
        buffers_flagged_skip: metrics.buffers_flagged_skip,
        buffers_voiced: metrics.buffers_voiced,
        mean_voice_probability: metrics.mean_voice_probability,
        kept_samples: session.kept().map(|chunk| chunk.trim.kept_samples).sum(),
        chunks: session.outcomes.iter().map(ChunkReport::from).collect(),
        manifest,
    }
}
