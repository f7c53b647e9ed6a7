pub mod audio;
pub mod config;
pub mod manifest;
pub mod recording;
mod telemetry;

pub use manifest::{ArchiveManifest, ChunkRecord, SpeechWindowUtc};
pub use recording::{start_recording_job, RecordingJob, RecordingMessage};
pub use telemetry::{init_tracing, tracing_log_path};
