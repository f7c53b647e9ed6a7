//! Windowed FFT band energies and spectral flux.

use std::f32::consts::PI;

pub(crate) const FFT_SIZE: usize = 512;
const LOW_BAND_HZ: f32 = 200.0;
const MID_BAND_HZ: f32 = 1_000.0;
const HIGH_BAND_HZ: f32 = 3_000.0;

/// Band energies (squared magnitudes) and onset flux for one buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectralSnapshot {
    /// Below 200 Hz.
    pub low_band: f32,
    /// 200 Hz to 1 kHz.
    pub mid_band: f32,
    /// 1 kHz to 3 kHz.
    pub high_band: f32,
    /// Above 3 kHz.
    pub air_band: f32,
    pub flux: f32,
}

impl SpectralSnapshot {
    pub fn speech_band(&self) -> f32 {
        self.low_band + self.mid_band
    }

    pub fn total_energy(&self) -> f32 {
        self.low_band + self.mid_band + self.high_band + self.air_band
    }
}

/// Stateful analyzer: remembers the previous magnitude spectrum for flux.
///
/// All FFT scratch is allocated once and reused for every buffer.
pub struct SpectralAnalyzer {
    bin_hz: f32,
    window: Vec<f32>,
    real: Vec<f32>,
    imag: Vec<f32>,
    magnitudes: Vec<f32>,
    previous: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        let window = (0..FFT_SIZE)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (FFT_SIZE - 1) as f32).cos())
            .collect();
        Self {
            bin_hz: sample_rate as f32 / FFT_SIZE as f32,
            window,
            real: vec![0.0; FFT_SIZE],
            imag: vec![0.0; FFT_SIZE],
            magnitudes: Vec::with_capacity(FFT_SIZE / 2),
            previous: Vec::with_capacity(FFT_SIZE / 2),
        }
    }

    /// Analyze the first `FFT_SIZE` samples of `samples`, zero-padding short input.
    pub fn analyze(&mut self, samples: &[i16]) -> SpectralSnapshot {
        let size = samples.len().min(FFT_SIZE);
        self.real.fill(0.0);
        self.imag.fill(0.0);
        for (idx, &sample) in samples[..size].iter().enumerate() {
            self.real[idx] = (f32::from(sample) / 32_768.0) * self.window[idx];
        }
        fft_in_place(&mut self.real, &mut self.imag);

        self.magnitudes.clear();
        self.magnitudes.extend(
            self.real[..FFT_SIZE / 2]
                .iter()
                .zip(&self.imag[..FFT_SIZE / 2])
                .map(|(re, im)| (re * re + im * im).sqrt()),
        );

        let flux = self.flux();
        let mut snapshot = SpectralSnapshot {
            flux,
            ..SpectralSnapshot::default()
        };
        for (bin, magnitude) in self.magnitudes.iter().enumerate() {
            let freq = bin as f32 * self.bin_hz;
            let energy = magnitude * magnitude;
            if freq < LOW_BAND_HZ {
                snapshot.low_band += energy;
            } else if freq < MID_BAND_HZ {
                snapshot.mid_band += energy;
            } else if freq < HIGH_BAND_HZ {
                snapshot.high_band += energy;
            } else {
                snapshot.air_band += energy;
            }
        }
        std::mem::swap(&mut self.previous, &mut self.magnitudes);
        snapshot
    }

    /// Drop the remembered spectrum so the next call reports zero flux.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    fn flux(&self) -> f32 {
        if self.previous.len() != self.magnitudes.len() {
            return 0.0;
        }
        let rising: f32 = self
            .magnitudes
            .iter()
            .zip(&self.previous)
            .map(|(now, before)| (now - before).max(0.0))
            .sum();
        rising / self.magnitudes.len().max(1) as f32
    }
}

/// Iterative radix-2 FFT. Both slices must share a power-of-two length.
pub(crate) fn fft_in_place(real: &mut [f32], imag: &mut [f32]) {
    let n = real.len();
    debug_assert_eq!(n, imag.len());
    debug_assert!(n.is_power_of_two());

    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            real.swap(i, j);
            imag.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let angle = -2.0 * PI / len as f32;
        let (step_im, step_re) = angle.sin_cos();
        for start in (0..n).step_by(len) {
            let mut w_re = 1.0f32;
            let mut w_im = 0.0f32;
            for k in 0..half {
                let even = start + k;
                let odd = even + half;
                let t_re = w_re * real[odd] - w_im * imag[odd];
                let t_im = w_re * imag[odd] + w_im * real[odd];
                real[odd] = real[even] - t_re;
                imag[odd] = imag[even] - t_im;
                real[even] += t_re;
                imag[even] += t_im;
                let next_re = w_re * step_re - w_im * step_im;
                w_im = w_re * step_im + w_im * step_re;
                w_re = next_re;
            }
        }
        len <<= 1;
    }
}
