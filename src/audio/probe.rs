//! Decode an audio file end to end and report what it actually contains.
//!
//! WAV files go through `hound`; every other container goes through
//! `symphonia`. Decoding the whole stream (rather than trusting the header)
//! is what makes this usable as a validity check.

use crate::error::{PrepError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// What a full decode of an audio file found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    pub duration_ms: f64,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: u64,
}

impl AudioInfo {
    fn from_frames(frames: u64, channels: u16, sample_rate: u32) -> Self {
        let duration_ms = if sample_rate == 0 {
            0.0
        } else {
            frames as f64 * 1000.0 / sample_rate as f64
        };
        Self {
            duration_ms,
            channels,
            sample_rate,
            frames,
        }
    }
}

/// Decode `path` completely and return its measured properties.
pub fn probe(path: &Path) -> Result<AudioInfo> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        probe_wav(path)
    } else {
        probe_symphonia(path)
    }
}

fn decode_error(path: &Path, message: impl Into<String>) -> PrepError {
    PrepError::AudioDecode {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn probe_wav(path: &Path) -> Result<AudioInfo> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| decode_error(path, format!("WAV: {e}")))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1);

    let samples = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .try_fold(0u64, |n, s| s.map(|_| n + 1)),
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .try_fold(0u64, |n, s| s.map(|_| n + 1)),
    }
    .map_err(|e| decode_error(path, format!("WAV samples: {e}")))?;

    Ok(AudioInfo::from_frames(
        samples / channels as u64,
        spec.channels,
        spec.sample_rate,
    ))
}

fn probe_symphonia(path: &Path) -> Result<AudioInfo> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(path, format!("probe failed: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error(path, "no audio track found"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params.channels.map_or(0, |c| c.count()) as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, format!("codec init failed: {e}")))?;

    let mut frames: u64 = 0;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(decode_error(path, format!("packet read: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| decode_error(path, format!("decode: {e}")))?;
        let spec = decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        if channels == 0 {
            channels = spec.channels.count() as u16;
        }
        frames += decoded.frames() as u64;
    }

    if sample_rate == 0 {
        return Err(decode_error(path, "unknown sample rate"));
    }
    Ok(AudioInfo::from_frames(frames, channels, sample_rate))
}
