//! Background recording job.
//!
//! A capture thread runs the streaming session and hands closed chunks to a
//! trim worker over a bounded channel, so trimming never stalls capture for
//! longer than the channel's slack. The caller polls one receiver for chunk
//! outcomes and a final `Finished` message.

use crate::audio::{
    finalize_chunk, CaptureMetrics, CaptureSession, CaptureSource, CaptureStep, ChunkOutcome,
    FinalizedChunk, LiveMeter, PendingChunk, SilenceTrimmer, StopReason, TrimConfig,
};
use crate::config::{AudioSettings, SessionConfig};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Messages sent from the job threads to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingMessage {
    Finalized(FinalizedChunk),
    Silent { chunk_id: String },
    BelowNoiseGate { chunk_id: String, peak: f32 },
    Error(String),
    /// Always the last message of a job.
    Finished(CaptureMetrics),
}

impl From<ChunkOutcome> for RecordingMessage {
    fn from(outcome: ChunkOutcome) -> Self {
        match outcome {
            ChunkOutcome::Kept(chunk) => RecordingMessage::Finalized(chunk),
            ChunkOutcome::Silent { chunk_id } => RecordingMessage::Silent { chunk_id },
            ChunkOutcome::BelowNoiseGate { chunk_id, peak } => {
                RecordingMessage::BelowNoiseGate { chunk_id, peak }
            }
        }
    }
}

enum WorkItem {
    Chunk {
        chunk: PendingChunk,
        settings: AudioSettings,
    },
    Done(CaptureMetrics),
}

/// Handle the caller uses to poll and steer a running job.
pub struct RecordingJob {
    pub receiver: Receiver<RecordingMessage>,
    pub stop_flag: Arc<AtomicBool>,
    settings_tx: Sender<AudioSettings>,
    handles: Vec<JoinHandle<()>>,
}

impl RecordingJob {
    /// Stop before the next buffer; the current buffer always completes.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Queue a settings snapshot for the capture thread. Returns false once capture has ended.
    pub fn update_settings(&self, settings: AudioSettings) -> bool {
        self.settings_tx.send(settings).is_ok()
    }

    pub fn join(self) -> Result<()> {
        for handle in self.handles {
            handle
                .join()
                .map_err(|_| anyhow!("recording thread panicked"))?;
        }
        Ok(())
    }
}

/// Spawn the capture thread and the trim worker.
///
/// The source's sample rate overrides `config.sample_rate`.
pub fn start_recording_job(
    source: Box<dyn CaptureSource + Send>,
    mut config: SessionConfig,
    settings: AudioSettings,
    meter: Option<LiveMeter>,
) -> Result<RecordingJob> {
    config.sample_rate = source.sample_rate();
    let (message_tx, message_rx) = unbounded();
    let (work_tx, work_rx) = bounded(config.channel_capacity.max(1));
    let (settings_tx, settings_rx) = unbounded();
    let stop_flag = Arc::new(AtomicBool::new(false));

    let trim = config.trim.clone();
    let worker_tx = message_tx.clone();
    let worker = thread::Builder::new()
        .name("voicegate-trim".into())
        .spawn(move || run_trim_worker(work_rx, worker_tx, trim))
        .context("failed to spawn trim worker")?;

    let capture_stop = Arc::clone(&stop_flag);
    let capture = thread::Builder::new()
        .name("voicegate-capture".into())
        .spawn(move || {
            let mut session = CaptureSession::new(&config, settings, Utc::now());
            if let Some(meter) = meter {
                session = session.with_meter(meter);
            }
            run_capture(session, source, capture_stop, settings_rx, work_tx, message_tx);
        })
        .context("failed to spawn capture thread")?;

    Ok(RecordingJob {
        receiver: message_rx,
        stop_flag,
        settings_tx,
        handles: vec![capture, worker],
    })
}

fn run_capture(
    mut session: CaptureSession,
    mut source: Box<dyn CaptureSource + Send>,
    stop_flag: Arc<AtomicBool>,
    settings_rx: Receiver<AudioSettings>,
    work_tx: Sender<WorkItem>,
    message_tx: Sender<RecordingMessage>,
) {
    let reason = loop {
        if stop_flag.load(Ordering::Relaxed) {
            break StopReason::ManualStop;
        }
        if let Some(latest) = settings_rx.try_iter().last() {
            session.update_settings(latest);
        }
        match session.capture_next(source.as_mut()) {
            Ok(CaptureStep::Buffer(Some(chunk))) => {
                let settings = *session.settings();
                if work_tx.send(WorkItem::Chunk { chunk, settings }).is_err() {
                    break StopReason::Error("trim worker disconnected".into());
                }
            }
            Ok(CaptureStep::Buffer(None)) => {}
            Ok(CaptureStep::Exhausted) => break StopReason::SourceExhausted,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "capture source failed");
                let _ = message_tx.send(RecordingMessage::Error(message.clone()));
                break StopReason::Error(message);
            }
        }
    };

    let settings = *session.settings();
    let (tail, metrics) = session.finish(reason);
    if let Some(chunk) = tail {
        let _ = work_tx.send(WorkItem::Chunk { chunk, settings });
    }
    info!(
        reason = metrics.stop_reason.label(),
        chunks = metrics.chunks_emitted,
        capture_ms = metrics.capture_ms,
        "capture stopped"
    );
    let _ = work_tx.send(WorkItem::Done(metrics));
}

fn run_trim_worker(
    work_rx: Receiver<WorkItem>,
    message_tx: Sender<RecordingMessage>,
    trim: Option<TrimConfig>,
) {
    for item in work_rx {
        let message = match item {
            WorkItem::Chunk { chunk, settings } => {
                let config = trim
                    .clone()
                    .unwrap_or_else(|| TrimConfig::from(&settings));
                finalize_chunk(chunk, &settings, &SilenceTrimmer::new(config)).into()
            }
            WorkItem::Done(metrics) => RecordingMessage::Finished(metrics),
        };
        if message_tx.send(message).is_err() {
            break;
        }
    }
}
