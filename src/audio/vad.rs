//! Voice activity features and the per-buffer engine seam used by capture.

use super::harmonic::HarmonicDetector;
use super::pipeline::VoiceProcessingResult;
use super::spectral::SpectralAnalyzer;
use crate::config::AudioSettings;

const MAX_ENERGY_RATIO: f32 = 6.0;
const FLAT_HIGH_BAND_RATIO: f32 = 2.0;

/// Per-buffer voice activity features.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VadResult {
    /// Speech band over high band, bias-adjusted and capped at 6.
    pub energy_ratio: f32,
    pub broadband_energy: f32,
    pub spectral_flux: f32,
    /// Periodicity in `[0, 1]`.
    pub harmonic_score: f32,
}

/// Combines spectral band energies with the harmonicity score.
pub struct AdaptiveVad {
    spectral: SpectralAnalyzer,
    harmonic: HarmonicDetector,
}

impl AdaptiveVad {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            spectral: SpectralAnalyzer::new(sample_rate),
            harmonic: HarmonicDetector::new(sample_rate),
        }
    }

    pub fn score(&mut self, samples: &[i16], settings: &AudioSettings) -> VadResult {
        let spectral = self.spectral.analyze(samples);
        let harmonic_score = self.harmonic.score(samples);
        let ratio = if spectral.high_band <= 1.0 {
            FLAT_HIGH_BAND_RATIO
        } else {
            spectral.speech_band() / spectral.high_band
        };
        VadResult {
            energy_ratio: (ratio * (1.0 + settings.voice_bias)).min(MAX_ENERGY_RATIO),
            broadband_energy: spectral.total_energy(),
            spectral_flux: spectral.flux,
            harmonic_score,
        }
    }

    pub fn reset(&mut self) {
        self.spectral.reset();
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
    Uncertain,
}

impl VadDecision {
    pub fn label(self) -> &'static str {
        match self {
            VadDecision::Speech => "speech",
            VadDecision::Silence => "silence",
            VadDecision::Uncertain => "uncertain",
        }
    }
}

/// Streaming voice detector driven once per capture buffer.
///
/// Implementations own all of their state for one recording session and are
/// never shared between threads while a buffer is in flight. Settings are a
/// snapshot read at the start of each call.
pub trait VadEngine {
    fn process(&mut self, samples: &[i16], settings: &AudioSettings) -> VoiceProcessingResult;
    fn reset(&mut self);
    fn name(&self) -> &'static str {
        "unknown_vad"
    }
}
