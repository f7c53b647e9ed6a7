//! Live level and voice-probability meter shared with UI readers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const FLOOR_DB: f32 = -96.0;

/// Lock-free live feedback shared between the capture thread and a UI.
///
/// Values are stored as `f32` bits so readers never block the capture loop.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    probability_bits: Arc<AtomicU32>,
    peak_db_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            probability_bits: Arc::new(AtomicU32::new(0.0f32.to_bits())),
            peak_db_bits: Arc::new(AtomicU32::new(FLOOR_DB.to_bits())),
        }
    }

    /// Publish the latest buffer's smoothed voice probability and raw peak.
    pub fn update(&self, voice_probability: f32, samples: &[i16]) {
        self.probability_bits
            .store(voice_probability.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        self.peak_db_bits
            .store(peak_dbfs(samples).to_bits(), Ordering::Relaxed);
    }

    pub fn voice_probability(&self) -> f32 {
        f32::from_bits(self.probability_bits.load(Ordering::Relaxed))
    }

    pub fn peak_db(&self) -> f32 {
        f32::from_bits(self.peak_db_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak magnitude as a fraction of full scale.
pub(crate) fn peak_level(samples: &[i16]) -> f32 {
    samples
        .iter()
        .map(|&s| i32::from(s).unsigned_abs())
        .max()
        .map_or(0.0, |peak| peak as f32 / 32_768.0)
}

pub(crate) fn peak_dbfs(samples: &[i16]) -> f32 {
    let peak = peak_level(samples);
    if peak <= 0.0 {
        return FLOOR_DB;
    }
    (20.0 * peak.log10()).max(FLOOR_DB)
}
