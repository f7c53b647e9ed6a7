//! UTC-anchored speech windows and the archive manifest.

use crate::audio::{FinalizedChunk, SpeechSegment};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechWindowUtc {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl SpeechWindowUtc {
    pub fn from_segment(chunk_start: DateTime<Utc>, segment: &SpeechSegment) -> Self {
        Self {
            start_utc: chunk_start + ms(segment.start_ms),
            end_utc: chunk_start + ms(segment.end_ms),
        }
    }
}

fn ms(value: u64) -> Duration {
    Duration::milliseconds(i64::try_from(value).unwrap_or(i64::MAX))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub duration_ms: u64,
    pub speech_segments: Vec<SpeechWindowUtc>,
}

impl ChunkRecord {
    pub fn from_finalized(chunk: &FinalizedChunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            session_start: chunk.started_at,
            session_end: chunk.ended_at,
            duration_ms: chunk.duration_ms,
            speech_segments: chunk
                .trim
                .segments
                .iter()
                .map(|segment| SpeechWindowUtc::from_segment(chunk.started_at, segment))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub archive_id: String,
    pub generated_utc: DateTime<Utc>,
    pub chunk_count: usize,
    pub chunks: Vec<ChunkRecord>,
}

impl ArchiveManifest {
    pub fn build<'a>(
        archive_id: impl Into<String>,
        generated_utc: DateTime<Utc>,
        chunks: impl IntoIterator<Item = &'a FinalizedChunk>,
    ) -> Self {
        let chunks: Vec<ChunkRecord> = chunks.into_iter().map(ChunkRecord::from_finalized).collect();
        Self {
            archive_id: archive_id.into(),
            generated_utc,
            chunk_count: chunks.len(),
            chunks,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.context("failed to serialize archive manifest")
    }
}
