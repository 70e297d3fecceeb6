//! FFmpeg Runner Module
//!
//! Executes FFmpeg and FFprobe commands for the render pipeline.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::process::{async_tool_command, display_command_line};

/// What the pipeline needs to know about a background clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_sec: f64,
    /// First video stream, if any
    pub video: Option<VideoStreamInfo>,
    pub has_audio: bool,
}

/// Video stream geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second from `r_frame_rate`
    pub fps: f64,
}

/// Output encoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderSettings {
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Output frame rate
    pub fps: u32,
    /// Video codec (e.g., "libx264")
    pub video_codec: String,
    /// Audio codec (e.g., "aac")
    pub audio_codec: String,
    /// Preset (for x264: ultrafast, superfast, fast, medium, slow)
    pub preset: String,
    /// CRF value for quality-based encoding (0-51, lower is better)
    pub crf: Option<u8>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::shorts_1080p()
    }
}

impl RenderSettings {
    /// Preset for Shorts/TikTok (vertical 1080p)
    pub fn shorts_1080p() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "ultrafast".to_string(),
            crf: None,
        }
    }

    /// Encoder arguments for the video and audio streams
    pub fn codec_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];
        if let Some(crf) = self.crf {
            args.push("-crf".to_string());
            args.push(crf.to_string());
        }
        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            self.fps.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ]);
        args
    }
}

/// FFmpeg Runner for executing media processing commands
#[derive(Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Run ffmpeg with the given arguments, failing on non-zero exit
    ///
    /// `what` names the operation in the error message.
    pub async fn run(&self, args: &[String], what: &str) -> FFmpegResult<()> {
        debug!(
            operation = what,
            command = %display_command_line(&self.info.ffmpeg_path.to_string_lossy(), args),
            "Running ffmpeg"
        );

        let output = async_tool_command(&self.info.ffmpeg_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "{} failed: {}",
                what,
                stderr.trim()
            )));
        }

        Ok(())
    }

    /// Apply an audio filter chain (e.g. `atempo=1.5`) and drop any video
    pub async fn filter_audio(&self, input: &Path, output: &Path, filter: &str) -> FFmpegResult<()> {
        ensure_input(input)?;
        ensure_output_dir(output)?;

        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-filter:a".to_string(),
            filter.to_string(),
            "-vn".to_string(),
            output.to_string_lossy().to_string(),
        ];

        self.run(&args, "Audio filter").await
    }

    /// Decode any audio file to 16-bit PCM WAV at its native rate and layout
    pub async fn decode_to_wav(&self, input: &Path, output: &Path) -> FFmpegResult<()> {
        ensure_input(input)?;
        ensure_output_dir(output)?;

        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            output.to_string_lossy().to_string(),
        ];

        self.run(&args, "Audio decode").await
    }

    /// Probe media file to get information
    pub async fn probe(&self, input: &Path) -> FFmpegResult<MediaInfo> {
        ensure_input(input)?;

        let output = async_tool_command(&self.info.ffprobe_path)
            .args(["-v", "error", "-print_format", "json"])
            .args(["-show_format", "-show_streams"])
            .arg(input)
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!("FFprobe failed: {}", stderr)));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&json_str)
    }
}

fn ensure_input(input: &Path) -> FFmpegResult<()> {
    if !input.exists() {
        return Err(FFmpegError::InvalidInput(format!(
            "Input file does not exist: {}",
            input.display()
        )));
    }
    Ok(())
}

fn ensure_output_dir(output: &Path) -> FFmpegResult<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FFmpegError::OutputError(format!("Failed to create output directory: {}", e))
            })?;
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// `"30/1"`, `"30000/1001"` or a plain number
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output
fn parse_probe_output(json_str: &str) -> FFmpegResult<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = probe
        .format
        .ok_or_else(|| FFmpegError::ParseError("Missing format info".to_string()))?;
    let duration_sec = format
        .duration
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let kind = |s: &ProbeStream, wanted: &str| s.codec_type.as_deref() == Some(wanted);

    let video = probe
        .streams
        .iter()
        .find(|s| kind(s, "video"))
        .map(|s| VideoStreamInfo {
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            fps: s
                .r_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .unwrap_or(30.0),
        });

    Ok(MediaInfo {
        duration_sec,
        video,
        has_audio: probe.streams.iter().any(|s| kind(s, "audio")),
    })
}
