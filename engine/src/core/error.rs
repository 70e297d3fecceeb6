//! StoryReel Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

use super::captions::audio::AudioExtractionError;
use super::captions::whisper::WhisperError;
use super::ffmpeg::FFmpegError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Background video not found: {0}")]
    BackgroundNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Font could not be loaded: {0}")]
    FontLoadFailed(String),

    // =========================================================================
    // Stage Errors
    // =========================================================================
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Speech recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("Subtitle rendering failed: {0}")]
    RasterizationFailed(String),

    #[error("Composition failed: {0}")]
    CompositionFailed(String),

    // =========================================================================
    // Subsystem Errors
    // =========================================================================
    #[error(transparent)]
    FFmpeg(#[from] FFmpegError),

    #[error(transparent)]
    Audio(#[from] AudioExtractionError),

    #[error(transparent)]
    Whisper(#[from] WhisperError),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Short stage label used when logging a failed segment
    pub fn stage(&self) -> &'static str {
        match self {
            CoreError::BackgroundNotFound(_) | CoreError::InvalidInput(_) => "input",
            CoreError::FontLoadFailed(_) | CoreError::RasterizationFailed(_) => "rasterize",
            CoreError::SynthesisFailed(_) => "synthesize",
            CoreError::RecognitionFailed(_) | CoreError::Whisper(_) | CoreError::Audio(_) => {
                "extract"
            }
            CoreError::CompositionFailed(_) | CoreError::FFmpeg(_) => "composite",
            CoreError::ConfigError(_) => "config",
            CoreError::IoError(_) | CoreError::JsonError(_) | CoreError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::BackgroundNotFound("bg.mp4".to_string());
        assert!(err.to_string().contains("bg.mp4"));

        let err = CoreError::SynthesisFailed("HTTP 503".to_string());
        assert_eq!(err.to_string(), "Speech synthesis failed: HTTP 503");
    }

    #[test]
    fn test_error_stage_labels() {
        assert_eq!(CoreError::SynthesisFailed(String::new()).stage(), "synthesize");
        assert_eq!(
            CoreError::from(WhisperError::FeatureNotEnabled).stage(),
            "extract"
        );
        assert_eq!(CoreError::from(FFmpegError::NotFound).stage(), "composite");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::IoError(_)));
    }
}
