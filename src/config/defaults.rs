pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_BUFFER_MS: u64 = 20;
pub const DEFAULT_CHUNK_SECONDS: u64 = 6;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

pub const DEFAULT_VAD_THRESHOLD: i32 = 3_500;
pub const DEFAULT_VAD_AGGRESSIVENESS: u8 = 2;
pub const DEFAULT_NOISE_GATE: f32 = 0.12;
pub const DEFAULT_VOICE_BIAS: f32 = 0.5;
pub const DEFAULT_DENOISE_LEVEL: f32 = 0.6;
pub const DEFAULT_CLASSIFIER_SENSITIVITY: f32 = 0.55;

/// Amplitude thresholds below this are raised to it.
pub const MIN_VAD_THRESHOLD: i32 = 500;
pub const MAX_VAD_AGGRESSIVENESS: u8 = 3;
pub const MAX_NOISE_GATE: f32 = 0.6;
pub const MIN_DENOISE_LEVEL: f32 = 0.2;
pub const MAX_DENOISE_LEVEL: f32 = 1.0;
pub const VOICE_BIAS_RANGE: (f32, f32) = (-1.0, 1.0);

pub(super) const MIN_BUFFER_MS: u64 = 5;
pub(super) const MAX_BUFFER_MS: u64 = 500;
pub(super) const MAX_CHUNK_SECONDS: u64 = 60;
pub(super) const MAX_PADDING_MS: u64 = 2_000;
