use super::validation::parse_session_start;
use super::{AppConfig, AudioSettings, SessionConfig};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let path = std::env::temp_dir().join(format!(
        "voicegate_config_{}_{nanos}_{name}",
        std::process::id()
    ));
    fs::write(&path, contents).expect("write temp file");
    path
}

fn config_with(args: &[&str]) -> (AppConfig, PathBuf) {
    let input = temp_file("input.wav", "RIFF");
    let input_arg = input.to_string_lossy().into_owned();
    let mut argv = vec!["test-app", input_arg.as_str()];
    argv.extend_from_slice(args);
    (AppConfig::parse_from(argv), input)
}

#[test]
fn accepts_defaults() {
    let (mut cfg, input) = config_with(&[]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.buffer_ms, 20);
    assert_eq!(cfg.chunk_seconds, 6);
    let _ = fs::remove_file(input);
}

#[test]
fn rejects_missing_input() {
    let mut cfg = AppConfig::parse_from(["test-app", "/definitely/not/here.wav"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_buffer_ms_out_of_bounds() {
    let (mut cfg, input) = config_with(&["--buffer-ms", "4"]);
    assert!(cfg.validate().is_err());
    let (mut cfg, _) = config_with(&["--buffer-ms", "501"]);
    assert!(cfg.validate().is_err());
    let (mut cfg, _) = config_with(&["--buffer-ms", "500"]);
    assert!(cfg.validate().is_ok());
    let _ = fs::remove_file(input);
}

#[test]
fn rejects_chunk_seconds_out_of_bounds() {
    let (mut cfg, input) = config_with(&["--chunk-seconds", "0"]);
    assert!(cfg.validate().is_err());
    let (mut cfg, _) = config_with(&["--chunk-seconds", "61"]);
    assert!(cfg.validate().is_err());
    let _ = fs::remove_file(input);
}

#[test]
fn rejects_invalid_trim_overrides() {
    let (mut cfg, input) = config_with(&["--trim-aggressiveness", "4"]);
    assert!(cfg.validate().is_err());
    let (mut cfg, _) = config_with(&["--trim-threshold", "40000"]);
    assert!(cfg.validate().is_err());
    let (mut cfg, _) = config_with(&["--min-silence-ms", "0"]);
    assert!(cfg.validate().is_err());
    let (mut cfg, _) = config_with(&["--padding-ms", "2001"]);
    assert!(cfg.validate().is_err());
    let _ = fs::remove_file(input);
}

#[test]
fn rejects_malformed_session_start() {
    let (mut cfg, input) = config_with(&["--session-start", "yesterday"]);
    assert!(cfg.validate().is_err());
    let (mut cfg, _) = config_with(&["--session-start", "2024-03-01T10:00:00Z"]);
    assert!(cfg.validate().is_ok());
    let _ = fs::remove_file(input);
}

#[test]
fn session_start_is_normalized_to_utc() {
    let ts = parse_session_start("2024-03-01T12:00:00+02:00").expect("parse");
    assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00+00:00");
}

#[test]
fn trim_config_layers_cli_overrides_on_settings() {
    let (cfg, input) = config_with(&["--padding-ms", "40", "--merge-padding"]);
    let settings = AudioSettings {
        vad_threshold: 2_000,
        vad_aggressiveness: 1,
        ..AudioSettings::default()
    };
    let trim = cfg.trim_config(&settings);
    assert_eq!(trim.threshold, 2_000);
    assert_eq!(trim.aggressiveness, 1);
    assert_eq!(trim.padding_ms, 40);
    assert_eq!(trim.min_speech_ms, 250);
    assert_eq!(trim.min_silence_ms, 350);
    assert!(trim.merge_overlapping_padding);
    let _ = fs::remove_file(input);
}

#[test]
fn settings_clamp_out_of_range_values() {
    let raw = AudioSettings {
        vad_threshold: 10,
        vad_aggressiveness: 9,
        noise_gate: 2.0,
        voice_bias: -4.0,
        denoise_level: 0.0,
        classifier_sensitivity: f32::NAN,
    };
    let clamped = raw.clamped();
    assert_eq!(clamped.vad_threshold, 500);
    assert_eq!(clamped.vad_aggressiveness, 3);
    assert_eq!(clamped.noise_gate, 0.6);
    assert_eq!(clamped.voice_bias, -1.0);
    assert_eq!(clamped.denoise_level, 0.2);
    assert_eq!(clamped.classifier_sensitivity, 0.55);
}

#[test]
fn settings_file_fills_missing_keys_with_defaults() {
    let path = temp_file("settings.yaml", "voice_bias: 0.8\ndenoise_level: 5.0\n");
    let settings = AudioSettings::load(&path).expect("load settings");
    assert_eq!(settings.voice_bias, 0.8);
    assert_eq!(settings.denoise_level, 1.0);
    assert_eq!(settings.vad_threshold, 3_500);
    assert_eq!(settings.classifier_sensitivity, 0.55);
    let _ = fs::remove_file(path);
}

#[test]
fn settings_file_accepts_json() {
    let path = temp_file("settings.json", r#"{"noise_gate": 0.05, "vad_aggressiveness": 0}"#);
    let settings = AudioSettings::load(&path).expect("load settings");
    assert_eq!(settings.noise_gate, 0.05);
    assert_eq!(settings.vad_aggressiveness, 0);
    let _ = fs::remove_file(path);
}

#[test]
fn settings_file_rejects_garbage() {
    let path = temp_file("settings_bad.yaml", "voice_bias: [not, a, number]\n");
    assert!(AudioSettings::load(&path).is_err());
    let _ = fs::remove_file(path);
}

#[test]
fn session_config_sample_counts() {
    let session = SessionConfig::default();
    assert_eq!(session.buffer_samples(), 320);
    assert_eq!(session.chunk_samples(), 96_000);
}
