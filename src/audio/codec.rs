//! PCM serialization for finalized chunks.
//!
//! The trimming core only ever sees flat `i16` buffers; these codecs are the
//! boundary to durable bytes.

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;

/// Mono PCM plus the rate it was captured at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPcm {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

pub trait PcmCodec {
    fn name(&self) -> &'static str;
    fn encode(&self, samples: &[i16], sample_rate: u32) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPcm>;
}

/// Lossless passthrough: a little-endian `u32` rate followed by little-endian samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPcmCodec;

impl PcmCodec for RawPcmCodec {
    fn name(&self) -> &'static str {
        "raw_pcm"
    }

    fn encode(&self, samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(4 + samples.len() * 2);
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedPcm> {
        if bytes.len() < 4 {
            bail!("raw pcm stream is missing its sample-rate prefix");
        }
        let (rate, payload) = bytes.split_at(4);
        if payload.len() % 2 != 0 {
            bail!("raw pcm payload has an odd byte count ({})", payload.len());
        }
        Ok(DecodedPcm {
            sample_rate: u32::from_le_bytes([rate[0], rate[1], rate[2], rate[3]]),
            samples: payload
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        })
    }
}

/// 16-bit mono RIFF/WAVE.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn check_spec(spec: &WavSpec) -> Result<()> {
    if spec.channels != 1 {
        bail!("expected mono audio, found {} channels", spec.channels);
    }
    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        bail!(
            "expected 16-bit integer PCM, found {}-bit {:?}",
            spec.bits_per_sample,
            spec.sample_format
        );
    }
    Ok(())
}

impl PcmCodec for WavCodec {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn encode(&self, samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, wav_spec(sample_rate))
                .context("failed to start wav stream")?;
            for &sample in samples {
                writer.write_sample(sample)?;
            }
            writer.finalize().context("failed to finalize wav stream")?;
        }
        Ok(cursor.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedPcm> {
        let reader = WavReader::new(Cursor::new(bytes)).context("invalid wav stream")?;
        let spec = reader.spec();
        check_spec(&spec)?;
        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to decode wav samples")?;
        Ok(DecodedPcm {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

pub fn read_wav_file(path: &Path) -> Result<DecodedPcm> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open wav file '{}'", path.display()))?;
    let spec = reader.spec();
    check_spec(&spec).with_context(|| format!("unsupported wav file '{}'", path.display()))?;
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read samples from '{}'", path.display()))?;
    Ok(DecodedPcm {
        samples,
        sample_rate: spec.sample_rate,
    })
}

pub fn write_wav_file(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let mut writer = WavWriter::create(path, wav_spec(sample_rate))
        .with_context(|| format!("failed to create wav file '{}'", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("failed to finalize wav file '{}'", path.display()))
}
