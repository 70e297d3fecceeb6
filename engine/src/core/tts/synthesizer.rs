//! Speech synthesis with speed adjustment.
//!
//! Raw backend audio is written to the segment's scratch directory, sped up
//! through an `atempo` chain and decoded once so the segment knows its
//! exact play duration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::backend::SpeechBackend;
use super::tempo::atempo_filter;
use super::voice::Voice;
use crate::core::captions::{decode_audio_file, DecodedAudio};
use crate::core::ffmpeg::FFmpegRunner;
use crate::core::{CoreError, CoreResult, TimeSec};

/// Default narration speed multiplier
pub const DEFAULT_NARRATION_SPEED: f64 = 1.5;

/// Synthesized narration for one segment
#[derive(Debug, Clone)]
pub struct SpeechTrack {
    /// Speed-adjusted audio file inside the segment's scratch directory
    pub path: PathBuf,
    /// Decoded mono samples at the file's native rate
    pub audio: DecodedAudio,
}

impl SpeechTrack {
    /// Play duration in seconds
    pub fn duration(&self) -> TimeSec {
        self.audio.duration()
    }
}

/// Text to speech at a fixed speed multiplier
pub struct SpeechSynthesizer {
    backend: Arc<dyn SpeechBackend>,
    runner: FFmpegRunner,
    speed: f64,
}

impl SpeechSynthesizer {
    pub fn new(backend: Arc<dyn SpeechBackend>, runner: FFmpegRunner, speed: f64) -> Self {
        Self {
            backend,
            runner,
            speed,
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Synthesizes `text` into `scratch_dir` and decodes the result.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        scratch_dir: &Path,
    ) -> CoreResult<SpeechTrack> {
        if text.trim().is_empty() {
            return Err(CoreError::InvalidInput("Narration text is empty".to_string()));
        }

        let raw_bytes = self.backend.synthesize(text, voice).await?;
        let raw_path = scratch_dir.join("speech_raw.mp3");
        tokio::fs::write(&raw_path, &raw_bytes).await?;

        let path = scratch_dir.join("speech.mp3");
        match atempo_filter(self.speed) {
            Some(filter) => {
                debug!(filter = %filter, backend = self.backend.name(), "Applying narration speed");
                self.runner
                    .filter_audio(&raw_path, &path, &filter)
                    .await
                    .map_err(|e| CoreError::SynthesisFailed(format!("Speed change failed: {}", e)))?;
            }
            None => tokio::fs::rename(&raw_path, &path).await?,
        }

        let audio = decode_audio_file(&self.runner, &path, scratch_dir).await?;
        if audio.samples.is_empty() {
            return Err(CoreError::SynthesisFailed(
                "Synthesized audio is empty".to_string(),
            ));
        }

        Ok(SpeechTrack { path, audio })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::core::ffmpeg::FFmpegInfo;

    struct FailingBackend;

    #[async_trait]
    impl SpeechBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn synthesize(&self, _text: &str, _voice: Voice) -> CoreResult<Vec<u8>> {
            Err(CoreError::SynthesisFailed("backend offline".to_string()))
        }
    }

    fn runner() -> FFmpegRunner {
        FFmpegRunner::new(FFmpegInfo {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            version: "test".to_string(),
        })
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let synth = SpeechSynthesizer::new(Arc::new(FailingBackend), runner(), 1.5);
        let temp_dir = TempDir::new().unwrap();
        let result = synth.synthesize("   ", Voice::Us, temp_dir.path()).await;
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let synth = SpeechSynthesizer::new(Arc::new(FailingBackend), runner(), 1.5);
        let temp_dir = TempDir::new().unwrap();
        let result = synth.synthesize("Hello.", Voice::Uk, temp_dir.path()).await;
        assert!(matches!(result, Err(CoreError::SynthesisFailed(_))));
        assert_eq!(result.unwrap_err().stage(), "synthesize");
    }

    #[test]
    fn test_speech_track_duration() {
        let track = SpeechTrack {
            path: PathBuf::from("speech.mp3"),
            audio: DecodedAudio {
                samples: vec![0.0; 44100 * 2],
                sample_rate: 44100,
            },
        };
        assert!((track.duration() - 2.0).abs() < 1e-9);
    }
}
