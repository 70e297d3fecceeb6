//! FFmpeg Integration Module
//!
//! Provides FFmpeg functionality for the render pipeline including:
//! - Binary detection (configured path or system install)
//! - Media probing via ffprobe
//! - Audio filtering (tempo change) and WAV decoding
//! - Running composed render commands

mod detection;
mod runner;

pub use detection::*;
pub use runner::{FFmpegRunner, MediaInfo, RenderSettings, VideoStreamInfo};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set paths.ffmpegPath in the config.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;
