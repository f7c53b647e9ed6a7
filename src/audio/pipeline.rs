//! Streaming entry point: denoise, score, classify, decide.

use super::classifier::VoiceClassifier;
use super::denoise::NoiseReducer;
use super::vad::{AdaptiveVad, VadDecision, VadEngine};
use crate::config::AudioSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProcessingResult {
    /// True when the smoothed probability is under the classifier sensitivity.
    pub should_skip: bool,
    /// Denoised copy of the input buffer, same length.
    pub processed: Vec<i16>,
    pub voice_probability: f32,
}

impl VoiceProcessingResult {
    pub fn decision(&self) -> VadDecision {
        if self.processed.is_empty() {
            VadDecision::Uncertain
        } else if self.should_skip {
            VadDecision::Silence
        } else {
            VadDecision::Speech
        }
    }
}

/// One instance per continuous recording session. Owns every stage's state.
pub struct VoiceProcessingPipeline {
    sample_rate: u32,
    denoiser: NoiseReducer,
    vad: AdaptiveVad,
    classifier: VoiceClassifier,
}

impl VoiceProcessingPipeline {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            denoiser: NoiseReducer::new(sample_rate),
            vad: AdaptiveVad::new(sample_rate),
            classifier: VoiceClassifier::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Run one capture buffer through every stage.
    ///
    /// The settings snapshot is clamped before use; it is never mutated.
    pub fn process(&mut self, buffer: &[i16], settings: &AudioSettings) -> VoiceProcessingResult {
        let settings = settings.clamped();
        let processed = self.denoiser.process(buffer, settings.denoise_level);
        let features = self.vad.score(&processed, &settings);
        let voice_probability = self.classifier.score(&processed, &features, &settings);
        VoiceProcessingResult {
            should_skip: voice_probability < settings.classifier_sensitivity,
            processed,
            voice_probability,
        }
    }

    /// Start over as if a new session began.
    pub fn reset(&mut self) {
        self.denoiser.reset();
        self.vad.reset();
        self.classifier.reset();
    }
}

impl VadEngine for VoiceProcessingPipeline {
    fn process(&mut self, samples: &[i16], settings: &AudioSettings) -> VoiceProcessingResult {
        VoiceProcessingPipeline::process(self, samples, settings)
    }

    fn reset(&mut self) {
        VoiceProcessingPipeline::reset(self);
    }

    fn name(&self) -> &'static str {
        "voice_pipeline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_buffer_keeps_length() {
        let mut pipeline = VoiceProcessingPipeline::new(16_000);
        let result = pipeline.process(&[1_200; 333], &AudioSettings::default());
        assert_eq!(result.processed.len(), 333);
        assert!((0.0..=1.0).contains(&result.voice_probability));
    }

    #[test]
    fn silence_is_skipped_with_neutral_bias() {
        let mut pipeline = VoiceProcessingPipeline::new(16_000);
        let settings = AudioSettings {
            voice_bias: 0.0,
            ..AudioSettings::default()
        };
        for _ in 0..5 {
            let result = pipeline.process(&[0; 320], &settings);
            assert!(result.should_skip);
            assert_eq!(result.decision(), VadDecision::Silence);
        }
    }

    #[test]
    fn empty_buffer_is_uncertain() {
        let mut pipeline = VoiceProcessingPipeline::new(16_000);
        let result = pipeline.process(&[], &AudioSettings::default());
        assert_eq!(result.decision(), VadDecision::Uncertain);
    }

    #[test]
    fn sensitivity_zero_never_skips() {
        let mut pipeline = VoiceProcessingPipeline::new(16_000);
        let settings = AudioSettings {
            classifier_sensitivity: 0.0,
            ..AudioSettings::default()
        };
        assert!(!pipeline.process(&[0; 320], &settings).should_skip);
    }

    #[test]
    fn reset_restores_fresh_behavior() {
        let settings = AudioSettings::default();
        let buffer: Vec<i16> = (0..320).map(|i| ((i % 40) * 400 - 8_000) as i16).collect();
        let mut fresh = VoiceProcessingPipeline::new(16_000);
        let expected = fresh.process(&buffer, &settings);

        let mut reused = VoiceProcessingPipeline::new(16_000);
        for _ in 0..4 {
            reused.process(&buffer, &settings);
        }
        reused.reset();
        assert_eq!(reused.process(&buffer, &settings), expected);
    }

    #[test]
    fn engine_trait_delegates() {
        let mut engine: Box<dyn VadEngine> = Box::new(VoiceProcessingPipeline::new(16_000));
        assert_eq!(engine.name(), "voice_pipeline");
        let result = engine.process(&[0; 320], &AudioSettings::default());
        assert_eq!(result.processed.len(), 320);
    }
}
