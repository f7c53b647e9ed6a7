//! Voice activity and noise suppression for 16-bit mono PCM.
//!
//! Two paths share nothing but the sample format. The streaming path runs
//! every capture buffer through [`VoiceProcessingPipeline`] for live feedback.
//! The offline path re-analyzes each closed chunk with [`SilenceTrimmer`] and
//! produces the authoritative speech segments and trimmed audio.

/// Capture rate used everywhere unless a recording says otherwise.
pub const TARGET_RATE: u32 = 16_000;

mod capture;
mod classifier;
mod codec;
mod denoise;
mod harmonic;
mod meter;
mod pipeline;
mod spectral;
#[cfg(test)]
mod tests;
mod trim;
mod vad;

pub use capture::{
    finalize_chunk, offline_session_from_pcm, CaptureMetrics, CaptureSession, CaptureSource,
    CaptureStep, ChunkOutcome, FinalizedChunk, OfflineSession, PcmSource, PendingChunk,
    StopReason,
};
pub use classifier::VoiceClassifier;
pub use codec::{read_wav_file, write_wav_file, DecodedPcm, PcmCodec, RawPcmCodec, WavCodec};
pub use denoise::NoiseReducer;
pub use harmonic::HarmonicDetector;
pub use meter::LiveMeter;
pub use pipeline::{VoiceProcessingPipeline, VoiceProcessingResult};
pub use spectral::{SpectralAnalyzer, SpectralSnapshot};
pub use trim::{SilenceTrimmer, SpeechSegment, TrimConfig, TrimResult, WAV_HEADER_BYTES};
pub use vad::{AdaptiveVad, VadDecision, VadEngine, VadResult};
