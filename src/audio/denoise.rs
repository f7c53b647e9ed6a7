//! Causal high-pass filter plus an adaptive amplitude gate.
//!
//! The filter memory survives across calls so consecutive capture buffers are
//! filtered as one continuous stream. The gate's noise floor is re-estimated
//! from scratch for every buffer.

use std::f32::consts::PI;

const DEFAULT_CUTOFF_HZ: f32 = 120.0;
const FLOOR_SMOOTHING: f32 = 0.9;
/// Residual magnitudes below this are treated as silence.
const ABSOLUTE_FLOOR: f32 = 60.0;
const MIN_GATE_WINDOW: usize = 64;

pub(crate) const MIN_LEVEL: f32 = 0.2;
pub(crate) const MAX_LEVEL: f32 = 1.0;

pub struct NoiseReducer {
    alpha: f32,
    gate_window: usize,
    warmup_samples: usize,
    prev_input: f32,
    prev_output: f32,
    filtered: Vec<f32>,
}

impl NoiseReducer {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_cutoff(sample_rate, DEFAULT_CUTOFF_HZ)
    }

    pub fn with_cutoff(sample_rate: u32, cutoff_hz: f32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let dt = 1.0 / sample_rate;
        Self {
            alpha: rc / (rc + dt),
            gate_window: ((sample_rate * 0.02) as usize).max(MIN_GATE_WINDOW),
            warmup_samples: ((sample_rate * 0.01) as usize).max(1),
            prev_input: 0.0,
            prev_output: 0.0,
            filtered: Vec::new(),
        }
    }

    /// Denoise one buffer. The output always has the input's length.
    ///
    /// `level` controls gate strength and is clamped to `[0.2, 1.0]`.
    pub fn process(&mut self, input: &[i16], level: f32) -> Vec<i16> {
        let level = if level.is_nan() {
            MIN_LEVEL
        } else {
            level.clamp(MIN_LEVEL, MAX_LEVEL)
        };
        self.high_pass(input);
        self.gate(level);

        let warmup = self.warmup_samples.min(self.filtered.len());
        self.filtered[..warmup].fill(0.0);

        self.filtered
            .iter()
            .map(|&sample| {
                if sample.abs() < ABSOLUTE_FLOOR {
                    0
                } else {
                    sample.clamp(i16::MIN as f32, i16::MAX as f32) as i16
                }
            })
            .collect()
    }

    /// Forget filter memory, e.g. when a new recording session starts.
    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }

    fn high_pass(&mut self, input: &[i16]) {
        self.filtered.clear();
        self.filtered.reserve(input.len());
        let mut prev_in = self.prev_input;
        let mut prev_out = self.prev_output;
        for &sample in input {
            let x = f32::from(sample);
            let y = self.alpha * (prev_out + x - prev_in);
            self.filtered.push(y);
            prev_in = x;
            prev_out = y;
        }
        self.prev_input = prev_in;
        self.prev_output = prev_out;
    }

    fn gate(&mut self, level: f32) {
        let factor = 1.2 + 1.2 * level;
        let mut noise_floor = 0.0f32;
        let mut current_floor = 0.0f32;
        for (idx, sample) in self.filtered.iter_mut().enumerate() {
            noise_floor = FLOOR_SMOOTHING * noise_floor + (1.0 - FLOOR_SMOOTHING) * *sample * *sample;
            if idx % self.gate_window == 0 {
                current_floor = noise_floor.sqrt();
            }
            if sample.abs() <= current_floor * factor {
                *sample = 0.0;
            }
        }
    }
}
