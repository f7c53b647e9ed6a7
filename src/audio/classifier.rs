//! Smoothed voice probability from VAD features and a slow noise tracker.

use super::vad::VadResult;
use crate::config::AudioSettings;

const INITIAL_NOISE_ENERGY: f32 = 2_000.0;
const INITIAL_PROBABILITY: f32 = 0.5;
const NOISE_DECAY: f32 = 0.92;
const PROBABILITY_DECAY: f32 = 0.6;
const MAX_ENERGY_BOOST: f32 = 8.0;

pub struct VoiceClassifier {
    noise_energy: f32,
    running_probability: f32,
}

impl Default for VoiceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceClassifier {
    pub fn new() -> Self {
        Self {
            noise_energy: INITIAL_NOISE_ENERGY,
            running_probability: INITIAL_PROBABILITY,
        }
    }

    /// Fold one buffer into the running probability and return it, in `[0, 1]`.
    pub fn score(&mut self, samples: &[i16], vad: &VadResult, settings: &AudioSettings) -> f32 {
        let total: i64 = samples.iter().map(|&s| i64::from(s).abs()).sum();
        let average_energy = total as f32 / samples.len().max(1) as f32;
        self.noise_energy =
            NOISE_DECAY * self.noise_energy + (1.0 - NOISE_DECAY) * average_energy;
        let energy_boost = (average_energy / (self.noise_energy + 1.0)).min(MAX_ENERGY_BOOST);

        let score = 0.35 * vad.energy_ratio
            + 0.25 * vad.harmonic_score
            + 0.2 * energy_boost
            + 0.2 * vad.spectral_flux.clamp(0.0, 1.0)
            + 0.15 * (1.0 + vad.broadband_energy * 1e-6).ln();
        let bias = (settings.voice_bias - 0.5) * 1.2;
        let probability = sigmoid(score * 0.35 + bias);

        self.running_probability =
            PROBABILITY_DECAY * self.running_probability + (1.0 - PROBABILITY_DECAY) * probability;
        self.running_probability = self.running_probability.clamp(0.0, 1.0);
        self.running_probability
    }

    pub fn running_probability(&self) -> f32 {
        self.running_probability
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
