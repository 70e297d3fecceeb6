//! Audio Decoding Module
//!
//! Turns a rendered speech file into the sample stream the recognizer
//! expects: decoded to WAV by FFmpeg, mixed down to mono, resampled to
//! 16kHz by linear interpolation and peak-normalized to [-1.0, 1.0].

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::core::ffmpeg::{FFmpegError, FFmpegRunner};
use crate::core::TimeSec;

/// Sample rate required by Whisper models
pub const RECOGNITION_SAMPLE_RATE: u32 = 16_000;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while decoding audio for recognition
#[derive(Error, Debug)]
pub enum AudioExtractionError {
    /// FFmpeg could not decode the input
    #[error("FFmpeg decode failed: {0}")]
    FFmpegFailed(#[from] FFmpegError),

    /// Input file not found
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    /// The WAV container could not be read
    #[error("Failed to read WAV file: {0}")]
    WavReadError(String),

    /// The decoded stream has a layout we cannot interpret
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Background decode task failed
    #[error("Decode task failed: {0}")]
    TaskFailed(String),

    /// IO error during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for audio decoding operations
pub type AudioResult<T> = Result<T, AudioExtractionError>;

// =============================================================================
// Decoded Audio
// =============================================================================

/// Mono floating-point audio at its native sample rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Play duration in seconds
    pub fn duration(&self) -> TimeSec {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples resampled to 16kHz and peak-normalized
    pub fn for_recognition(&self) -> Vec<f32> {
        let mut samples = resample_linear(&self.samples, self.sample_rate, RECOGNITION_SAMPLE_RATE);
        peak_normalize(&mut samples);
        samples
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decodes `input` through FFmpeg into `scratch_dir` and loads it as mono.
///
/// The intermediate WAV is left in `scratch_dir`, which the caller owns.
pub async fn decode_audio_file(
    runner: &FFmpegRunner,
    input: &Path,
    scratch_dir: &Path,
) -> AudioResult<DecodedAudio> {
    if !input.exists() {
        return Err(AudioExtractionError::InputNotFound(
            input.to_string_lossy().to_string(),
        ));
    }

    let wav_path = scratch_dir.join("decoded.wav");
    runner.decode_to_wav(input, &wav_path).await?;

    let decoded = tokio::task::spawn_blocking(move || load_wav(&wav_path))
        .await
        .map_err(|e| AudioExtractionError::TaskFailed(e.to_string()))??;

    debug!(
        sample_rate = decoded.sample_rate,
        duration = decoded.duration(),
        "Decoded narration audio"
    );
    Ok(decoded)
}

/// Loads a WAV file of any rate and channel count as mono f32 samples.
pub fn load_wav(wav_path: &Path) -> AudioResult<DecodedAudio> {
    let reader = hound::WavReader::open(wav_path)
        .map_err(|e| AudioExtractionError::WavReadError(e.to_string()))?;

    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioExtractionError::UnsupportedFormat(
            "WAV declares zero channels".to_string(),
        ));
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (hound::SampleFormat::Int, 32) => reader
            .into_samples::<i32>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        (hound::SampleFormat::Float, 32) => {
            reader.into_samples::<f32>().filter_map(Result::ok).collect()
        }
        (format, bits) => {
            return Err(AudioExtractionError::UnsupportedFormat(format!(
                "{:?} samples at {} bits",
                format, bits
            )));
        }
    };

    Ok(DecodedAudio {
        samples: downmix_to_mono(&interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

// =============================================================================
// Sample Processing
// =============================================================================

/// Averages interleaved frames into a single channel
pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resamples by linear interpolation over evenly spaced positions.
///
/// The output holds `floor(len * to / from)` samples whose first and last
/// values coincide with the input's first and last samples.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let target_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    match target_len {
        0 => return Vec::new(),
        1 => return vec![samples[0]],
        _ => {}
    }

    let last = samples.len() - 1;
    let step = last as f64 / (target_len - 1) as f64;

    (0..target_len)
        .map(|i| {
            let pos = i as f64 * step;
            let left = (pos.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let frac = (pos - left as f64) as f32;
            samples[left] + (samples[right] - samples[left]) * frac
        })
        .collect()
}

/// Scales samples so the loudest one has magnitude 1.0; silence is untouched
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        for sample in samples.iter_mut() {
            *sample /= peak;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
