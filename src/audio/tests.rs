use super::{
    finalize_chunk, offline_session_from_pcm, CaptureSession, CaptureStep,
    ChunkOutcome, LiveMeter, PcmCodec, PcmSource, RawPcmCodec, SilenceTrimmer, StopReason,
    TrimConfig, VadEngine, VoiceProcessingPipeline, VoiceProcessingResult, WavCodec, TARGET_RATE,
};
use crate::config::{AudioSettings, SessionConfig};
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

const SAMPLE_RATE: u32 = TARGET_RATE;
const BUFFER: usize = 320;

fn session_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn gaussian(rng: &mut StdRng, sigma: f32) -> f32 {
    let sum: f32 = (0..12).map(|_| rng.random::<f32>()).sum();
    (sum - 6.0) * sigma
}

fn tone(len: usize, freq: f32, amplitude: f32) -> Vec<i16> {
    (0..len)
        .map(|i| (amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin()) as i16)
        .collect()
}

/// Voiced-like tone: 200 Hz fundamental with two decaying harmonics.
fn voiced(i: usize) -> f32 {
    let t = i as f32 / SAMPLE_RATE as f32;
    (2.0 * PI * 200.0 * t).sin() + 0.5 * (2.0 * PI * 400.0 * t).sin()
        + 0.25 * (2.0 * PI * 600.0 * t).sin()
}

fn power(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum::<f32>() / samples.len().max(1) as f32
}

fn two_bursts() -> Vec<i16> {
    let mut samples = vec![0; 8_000];
    samples.extend(tone(16_000, 1_000.0, 10_000.0));
    samples.extend(vec![0; 8_000]);
    samples.extend(tone(16_000, 1_000.0, 10_000.0));
    samples.extend(vec![0; 8_000]);
    samples
}

#[test]
fn low_level_noise_buffer_is_skipped() {
    let mut rng = StdRng::seed_from_u64(42);
    let noise: Vec<i16> = (0..BUFFER)
        .map(|_| gaussian(&mut rng, 300.0) as i16)
        .collect();
    let mut pipeline = VoiceProcessingPipeline::new(SAMPLE_RATE);
    let result = pipeline.process(&noise, &AudioSettings::default());
    assert!(result.should_skip, "probability {}", result.voice_probability);
    assert_eq!(result.processed.len(), BUFFER);
}

#[test]
fn noise_averse_bias_drives_noise_probability_low() {
    let mut rng = StdRng::seed_from_u64(1234);
    let settings = AudioSettings {
        voice_bias: -1.0,
        ..AudioSettings::default()
    };
    let mut pipeline = VoiceProcessingPipeline::new(SAMPLE_RATE);
    let mut last = None;
    for _ in 0..10 {
        let noise: Vec<i16> = (0..BUFFER)
            .map(|_| gaussian(&mut rng, 300.0) as i16)
            .collect();
        last = Some(pipeline.process(&noise, &settings));
    }
    let last = last.expect("processed at least one buffer");
    assert!(last.should_skip);
    assert!(last.voice_probability < 0.3, "probability {}", last.voice_probability);
}

#[test]
fn harmonic_tone_in_moderate_noise_is_kept() {
    let mut rng = StdRng::seed_from_u64(99);
    let total = BUFFER * 25;
    let signal: Vec<f32> = (0..total).map(|i| 8_000.0 * voiced(i)).collect();
    let noise: Vec<f32> = (0..total).map(|_| gaussian(&mut rng, 1_000.0)).collect();
    let snr_db = 10.0 * (power(&signal) / power(&noise)).log10();
    assert!(snr_db >= 8.0, "snr {snr_db}");

    let mixed: Vec<i16> = signal
        .iter()
        .zip(&noise)
        .map(|(s, n)| (s + n).clamp(-32_768.0, 32_767.0) as i16)
        .collect();
    let mut pipeline = VoiceProcessingPipeline::new(SAMPLE_RATE);
    let settings = AudioSettings::default();
    let mut last = None;
    for buffer in mixed.chunks(BUFFER) {
        last = Some(pipeline.process(buffer, &settings));
    }
    let last = last.expect("processed at least one buffer");
    assert!(!last.should_skip, "probability {}", last.voice_probability);
    assert!(last.voice_probability > 0.55);
}

#[test]
fn sweep_scenario_keeps_most_of_the_clip() {
    let total = 2 * SAMPLE_RATE as usize;
    let mut phase = 0.0f32;
    let sweep: Vec<i16> = (0..total)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let freq = 180.0 + 70.0 * t / 2.0;
            let sample = 0.85 * 32_767.0 * phase.sin();
            phase += 2.0 * PI * freq / SAMPLE_RATE as f32;
            sample as i16
        })
        .collect();

    let result = SilenceTrimmer::new(TrimConfig::default()).trim(&sweep, SAMPLE_RATE);
    assert!(!result.segments.is_empty());
    let longest = result
        .segments
        .iter()
        .map(|segment| segment.duration_ms())
        .max()
        .unwrap_or(0);
    assert!(longest >= 1_600, "longest segment {longest} ms");
    assert_eq!(result.kept_samples, total);
    assert_eq!(result.samples.len(), result.kept_samples);
}

#[test]
fn codec_round_trip_preserves_segments() {
    let samples = two_bursts();
    let trimmer = SilenceTrimmer::new(TrimConfig {
        threshold: 500,
        ..TrimConfig::default()
    });
    let direct = trimmer.trim(&samples, SAMPLE_RATE);
    assert_eq!(direct.segments.len(), 2);

    let codecs: [&dyn PcmCodec; 2] = [&RawPcmCodec, &WavCodec];
    for codec in codecs {
        let bytes = codec.encode(&samples, SAMPLE_RATE).expect("encode");
        let decoded = codec.decode(&bytes).expect("decode");
        let again = trimmer.trim(&decoded.samples, decoded.sample_rate);
        assert_eq!(again.segments.len(), direct.segments.len(), "{}", codec.name());
        for (a, b) in again.segments.iter().zip(&direct.segments) {
            assert!(a.start_ms.abs_diff(b.start_ms) <= 15);
            assert!(a.end_ms.abs_diff(b.end_ms) <= 15);
        }
    }
}

#[test]
fn wav_bytes_trim_matches_in_memory_trim() {
    let samples = two_bursts();
    let trimmer = SilenceTrimmer::new(TrimConfig {
        threshold: 500,
        ..TrimConfig::default()
    });
    let bytes = WavCodec.encode(&samples, SAMPLE_RATE).expect("encode");
    let from_bytes = trimmer.trim_wav_bytes(&bytes).expect("trim");
    assert_eq!(from_bytes, trimmer.trim(&samples, SAMPLE_RATE));
}

#[test]
fn offline_session_chunks_gates_and_trims() {
    let mut samples = vec![0i16; 4_000];
    samples.extend(tone(8_000, 1_000.0, 10_000.0));
    samples.extend(vec![0; 4_000]);
    samples.extend(vec![0; 16_000]);
    let mut tail = vec![0; 8_000];
    tail[100] = 10_000;
    samples.extend(tail);

    let config = SessionConfig {
        chunk_seconds: 1,
        ..SessionConfig::default()
    };
    let session = offline_session_from_pcm(&samples, &config, &AudioSettings::default(), session_start());

    let labels: Vec<_> = session.outcomes.iter().map(ChunkOutcome::label).collect();
    assert_eq!(labels, vec!["kept", "below_noise_gate", "silent"]);

    let kept: Vec<_> = session.kept().collect();
    assert_eq!(kept.len(), 1);
    let chunk = kept[0];
    assert_eq!(chunk.trim.segments.len(), 1);
    assert_eq!(chunk.trim.segments[0].start_ms, 250);
    assert_eq!(chunk.trim.segments[0].end_ms, 749);
    assert_eq!(chunk.trim.kept_samples, 12_799);
    assert_eq!(chunk.duration_ms, 799);
    assert_eq!(chunk.started_at, session_start());

    assert_eq!(session.metrics.buffers_processed, 125);
    assert_eq!(session.metrics.chunks_emitted, 3);
    assert_eq!(session.metrics.capture_ms, 2_500);
    assert_eq!(session.metrics.engine, "voice_pipeline");
    assert_eq!(session.metrics.stop_reason, StopReason::SourceExhausted);
}

#[test]
fn chunk_windows_are_contiguous_in_utc() {
    let config = SessionConfig {
        chunk_seconds: 1,
        ..SessionConfig::default()
    };
    let mut session = CaptureSession::new(&config, AudioSettings::default(), session_start());
    let mut chunks = Vec::new();
    for buffer in vec![0i16; 40_000].chunks(BUFFER) {
        chunks.extend(session.push_buffer(buffer));
    }
    let (tail, metrics) = session.finish(StopReason::ManualStop);
    chunks.extend(tail);

    assert_eq!(chunks.len(), 3);
    assert_eq!(metrics.stop_reason.label(), "manual_stop");
    assert_eq!(chunks[2].samples.len(), 8_000);
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].ended_at, pair[1].started_at);
        assert_ne!(pair[0].chunk_id, pair[1].chunk_id);
    }
    assert_eq!(
        (chunks[2].ended_at - session_start()).num_milliseconds(),
        2_500
    );
}

#[test]
fn empty_session_has_no_tail_chunk() {
    let session = CaptureSession::new(&SessionConfig::default(), AudioSettings::default(), session_start());
    let (tail, metrics) = session.finish(StopReason::SourceExhausted);
    assert!(tail.is_none());
    assert_eq!(metrics.buffers_processed, 0);
    assert_eq!(metrics.mean_voice_probability, 0.0);
}

#[test]
fn capture_next_reads_until_exhausted() {
    let mut source = PcmSource::new(vec![500; 700], SAMPLE_RATE);
    let mut session = CaptureSession::new(&SessionConfig::default(), AudioSettings::default(), session_start());
    let mut buffers = 0;
    loop {
        match session.capture_next(&mut source).expect("read") {
            CaptureStep::Buffer(chunk) => {
                assert!(chunk.is_none());
                buffers += 1;
            }
            CaptureStep::Exhausted => break,
        }
    }
    assert_eq!(buffers, 3);
    let (tail, _) = session.finish(StopReason::SourceExhausted);
    assert_eq!(tail.map(|chunk| chunk.samples.len()), Some(700));
}

struct RecordingEngine {
    seen_bias: Arc<Mutex<Vec<f32>>>,
}

impl VadEngine for RecordingEngine {
    fn process(&mut self, samples: &[i16], settings: &AudioSettings) -> VoiceProcessingResult {
        self.seen_bias
            .lock()
            .expect("bias lock")
            .push(settings.voice_bias);
        VoiceProcessingResult {
            should_skip: true,
            processed: samples.to_vec(),
            voice_probability: 0.1,
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "recording_engine"
    }
}

#[test]
fn settings_updates_apply_from_the_next_buffer() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let engine = Box::new(RecordingEngine {
        seen_bias: Arc::clone(&seen),
    });
    let mut session = CaptureSession::with_engine(
        &SessionConfig::default(),
        AudioSettings::default(),
        session_start(),
        engine,
    );
    session.push_buffer(&[0; BUFFER]);
    session.push_buffer(&[0; BUFFER]);
    session.update_settings(AudioSettings {
        voice_bias: 0.9,
        ..AudioSettings::default()
    });
    session.push_buffer(&[0; BUFFER]);
    session.update_settings(AudioSettings {
        voice_bias: 7.0,
        ..AudioSettings::default()
    });
    session.push_buffer(&[0; BUFFER]);

    assert_eq!(*seen.lock().expect("bias lock"), vec![0.5, 0.5, 0.9, 1.0]);
    let (_, metrics) = session.finish(StopReason::ManualStop);
    assert_eq!(metrics.engine, "recording_engine");
    assert_eq!(metrics.buffers_flagged_skip, 4);
    assert_eq!(metrics.buffers_voiced, 0);
    assert!((metrics.mean_voice_probability - 0.1).abs() < 1e-6);
}

#[test]
fn live_meter_tracks_latest_buffer() {
    let meter = LiveMeter::new();
    let mut session = CaptureSession::new(&SessionConfig::default(), AudioSettings::default(), session_start())
        .with_meter(meter.clone());
    session.push_buffer(&tone(BUFFER, 440.0, 16_000.0));
    assert!(meter.peak_db() > -7.0);
    assert!(meter.voice_probability() > 0.0);
}

#[test]
fn finalize_reports_noise_gate_peak() {
    let config = SessionConfig {
        chunk_seconds: 1,
        ..SessionConfig::default()
    };
    let mut session = CaptureSession::new(&config, AudioSettings::default(), session_start());
    let chunk = vec![1_000i16; 16_000]
        .chunks(BUFFER)
        .find_map(|buffer| session.push_buffer(buffer))
        .expect("chunk closes at one second");
    let outcome = finalize_chunk(chunk, &AudioSettings::default(), &SilenceTrimmer::default());
    match outcome {
        ChunkOutcome::BelowNoiseGate { peak, .. } => {
            assert!((peak - 1_000.0 / 32_768.0).abs() < 1e-6)
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn buffers_are_counted_by_decision() {
    let mut session = CaptureSession::new(
        &SessionConfig::default(),
        AudioSettings {
            classifier_sensitivity: 0.0,
            ..AudioSettings::default()
        },
        session_start(),
    );
    session.push_buffer(&tone(BUFFER, 440.0, 8_000.0));
    session.push_buffer(&tone(BUFFER, 440.0, 8_000.0));
    session.push_buffer(&[]);
    let (_, metrics) = session.finish(StopReason::SourceExhausted);
    assert_eq!(metrics.buffers_processed, 3);
    assert_eq!(metrics.buffers_voiced, 2);
    assert_eq!(metrics.buffers_flagged_skip, 0);
}
