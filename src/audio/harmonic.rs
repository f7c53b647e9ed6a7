//! Autocorrelation periodicity score over the voiced pitch range (70-400 Hz).

const MAX_PITCH_HZ: u32 = 400;
const MIN_PITCH_HZ: u32 = 70;
const MIN_LAG_FLOOR: usize = 10;

pub struct HarmonicDetector {
    min_lag: usize,
    max_lag: usize,
    max_window: usize,
    normalized: Vec<f32>,
}

impl HarmonicDetector {
    pub fn new(sample_rate: u32) -> Self {
        let min_lag = ((sample_rate / MAX_PITCH_HZ) as usize).max(MIN_LAG_FLOOR);
        let max_lag = ((sample_rate / MIN_PITCH_HZ) as usize).max(min_lag + 10);
        Self {
            min_lag,
            max_lag,
            max_window: (sample_rate / 4) as usize,
            normalized: Vec::new(),
        }
    }

    /// Peak normalized autocorrelation in `[0, 1]`; 0 when the buffer is not
    /// longer than the largest lag.
    pub fn score(&mut self, samples: &[i16]) -> f32 {
        let size = samples.len().min(self.max_window);
        if size <= self.max_lag {
            return 0.0;
        }
        self.normalized.clear();
        self.normalized
            .extend(samples[..size].iter().map(|&s| f32::from(s) / 32_768.0));
        let energy = self
            .normalized
            .iter()
            .map(|x| x * x)
            .sum::<f32>()
            .max(1e-6);
        let mean_energy = energy / size as f32;

        let mut best = 0.0f32;
        for lag in self.min_lag..=self.max_lag {
            let count = size - lag;
            let sum: f32 = self.normalized[lag..]
                .iter()
                .zip(&self.normalized[..count])
                .map(|(a, b)| a * b)
                .sum();
            let corr = (sum / count as f32) / mean_energy;
            best = best.max(corr);
        }
        best.clamp(0.0, 1.0)
    }
}
