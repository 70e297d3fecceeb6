//! Pipeline Configuration
//!
//! Provides the JSON configuration for a generation run with:
//! - Defaults for every field (a missing file or section is valid)
//! - Tolerant normalization (bad values are clamped, not rejected)
//! - Atomic file writes (temp file + rename)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::captions::{
    ChunkOptions, TranscriptionOptions, WhisperModel, DEFAULT_MAX_WORDS_PER_CHUNK,
    MIN_CHUNK_DURATION,
};
use crate::core::ffmpeg::RenderSettings;
use crate::core::narration::{SpeakingRate, DEFAULT_WORDS_PER_MINUTE};
use crate::core::text::SubtitleStyle;
use crate::core::tts::DEFAULT_NARRATION_SPEED;
use crate::core::{CoreError, CoreResult};

/// Default configuration file name
pub const CONFIG_FILE: &str = "storyreel.json";

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub narration: NarrationSettings,

    #[serde(default)]
    pub subtitles: SubtitleSettings,

    #[serde(default)]
    pub recognition: RecognitionSettings,

    #[serde(default)]
    pub render: RenderSettings,
}

impl PipelineConfig {
    /// Reads and normalizes a configuration file
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: PipelineConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.normalize();
        Ok(config)
    }

    /// Like [`PipelineConfig::load`], but a missing file yields defaults
    pub fn load_or_default(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Writes the normalized configuration atomically
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let mut normalized = self.clone();
        normalized.normalize();
        let content = serde_json::to_string_pretty(&normalized)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Normalizes and clamps values so a loaded config is always usable.
    ///
    /// Corrects bad values instead of failing.
    pub fn normalize(&mut self) {
        self.narration.words_per_minute =
            clamp_f64(self.narration.words_per_minute, 1.0, 1000.0, DEFAULT_WORDS_PER_MINUTE);
        self.narration.speed = clamp_f64(self.narration.speed, 0.25, 8.0, DEFAULT_NARRATION_SPEED);

        let subs = &mut self.subtitles;
        subs.max_words_per_chunk = subs.max_words_per_chunk.max(1);
        subs.max_lines = subs.max_lines.max(1);
        subs.font_size = clamp_f32(subs.font_size, 8.0, 400.0, default_font_size());
        subs.stroke_width = subs.stroke_width.min(50);
        subs.vertical_anchor = clamp_f64(subs.vertical_anchor, 0.0, 1.0, default_vertical_anchor());
        subs.min_chunk_sec = clamp_f64(subs.min_chunk_sec, 0.01, 5.0, MIN_CHUNK_DURATION);

        if self.recognition.model.parse::<WhisperModel>().is_err() {
            warn!(
                "Unknown recognition model '{}', using '{}'",
                self.recognition.model,
                WhisperModel::default().name()
            );
            self.recognition.model = WhisperModel::default().name().to_string();
        }
        if self.recognition.language.trim().is_empty() {
            self.recognition.language = default_language();
        }

        let render = &mut self.render;
        // Even dimensions keep yuv420p happy
        render.width = (render.width.clamp(16, 7680) / 2) * 2;
        render.height = (render.height.clamp(16, 7680) / 2) * 2;
        render.fps = render.fps.clamp(1, 120);
        render.crf = render.crf.map(|crf| crf.min(51));
    }

    pub fn speaking_rate(&self) -> SpeakingRate {
        SpeakingRate::new(self.narration.words_per_minute)
    }

    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            max_words_per_chunk: self.subtitles.max_words_per_chunk,
            min_duration: self.subtitles.min_chunk_sec,
        }
    }

    pub fn subtitle_style(&self) -> SubtitleStyle {
        SubtitleStyle {
            font_size: self.subtitles.font_size,
            stroke_width: self.subtitles.stroke_width,
            margin_px: self.subtitles.margin_px,
            max_lines: self.subtitles.max_lines,
            ..SubtitleStyle::default()
        }
    }

    pub fn whisper_model(&self) -> WhisperModel {
        self.recognition.model.parse().unwrap_or_default()
    }

    pub fn transcription_options(&self) -> TranscriptionOptions {
        TranscriptionOptions {
            language: Some(self.recognition.language.clone()),
            threads: self.recognition.threads,
        }
    }
}

fn clamp_f64(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

// =============================================================================
// Sections
// =============================================================================

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_background_dir")]
    pub background_dir: PathBuf,

    /// Subtitle font; a system bold sans font is used when unset
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// FFmpeg binary or directory; PATH and common locations when unset
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            background_dir: default_background_dir(),
            font_path: None,
            ffmpeg_path: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output_videos")
}

fn default_background_dir() -> PathBuf {
    PathBuf::from("background_videos")
}

/// Speech rate settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NarrationSettings {
    /// Rate used for duration estimates and budgets
    #[serde(default = "default_wpm")]
    pub words_per_minute: f64,

    /// Playback speed multiplier applied to synthesized speech
    #[serde(default = "default_speed")]
    pub speed: f64,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            words_per_minute: default_wpm(),
            speed: default_speed(),
        }
    }
}

fn default_wpm() -> f64 {
    DEFAULT_WORDS_PER_MINUTE
}

fn default_speed() -> f64 {
    DEFAULT_NARRATION_SPEED
}

/// Subtitle chunking and appearance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSettings {
    #[serde(default = "default_max_words")]
    pub max_words_per_chunk: usize,

    #[serde(default = "default_font_size")]
    pub font_size: f32,

    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,

    /// Horizontal margin on each side
    #[serde(default = "default_margin")]
    pub margin_px: u32,

    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Fraction of the frame height where strips are anchored
    #[serde(default = "default_vertical_anchor")]
    pub vertical_anchor: f64,

    /// Pixels the strip is raised above the anchor
    #[serde(default = "default_vertical_offset")]
    pub vertical_offset_px: u32,

    #[serde(default = "default_min_chunk")]
    pub min_chunk_sec: f64,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            max_words_per_chunk: default_max_words(),
            font_size: default_font_size(),
            stroke_width: default_stroke_width(),
            margin_px: default_margin(),
            max_lines: default_max_lines(),
            vertical_anchor: default_vertical_anchor(),
            vertical_offset_px: default_vertical_offset(),
            min_chunk_sec: default_min_chunk(),
        }
    }
}

fn default_max_words() -> usize {
    DEFAULT_MAX_WORDS_PER_CHUNK
}

fn default_font_size() -> f32 {
    66.0
}

fn default_stroke_width() -> u32 {
    5
}

fn default_margin() -> u32 {
    80
}

fn default_max_lines() -> usize {
    3
}

fn default_vertical_anchor() -> f64 {
    0.85
}

fn default_vertical_offset() -> u32 {
    40
}

fn default_min_chunk() -> f64 {
    MIN_CHUNK_DURATION
}

/// Speech recognition settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionSettings {
    /// Model size: tiny, base, small, medium or large
    #[serde(default = "default_model")]
    pub model: String,

    /// Explicit model file; the models directory is searched when unset
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_language")]
    pub language: String,

    /// Inference threads (0 = auto)
    #[serde(default)]
    pub threads: u32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            model_path: None,
            language: default_language(),
            threads: 0,
        }
    }
}

fn default_model() -> String {
    WhisperModel::Base.name().to_string()
}

fn default_language() -> String {
    "en".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.paths.output_dir, PathBuf::from("output_videos"));
        assert_eq!(config.narration.words_per_minute, 150.0);
        assert_eq!(config.narration.speed, 1.5);
        assert_eq!(config.subtitles.max_words_per_chunk, 14);
        assert_eq!(config.subtitles.max_lines, 3);
        assert_eq!(config.recognition.model, "base");
        assert_eq!(config.render.width, 1080);
        assert_eq!(config.render.height, 1920);
        assert_eq!(config.render.fps, 30);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "narration": { "speed": 1.25 }, "subtitles": { "fontSize": 72 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.narration.speed, 1.25);
        assert_eq!(config.narration.words_per_minute, 150.0);
        assert_eq!(config.subtitles.font_size, 72.0);
        assert_eq!(config.subtitles.stroke_width, 5);
        assert_eq!(config.render.preset, "ultrafast");
    }

    #[test]
    fn test_normalize_clamps() {
        let mut config = PipelineConfig::default();
        config.narration.speed = 20.0;
        config.narration.words_per_minute = f64::NAN;
        config.subtitles.max_lines = 0;
        config.subtitles.max_words_per_chunk = 0;
        config.subtitles.vertical_anchor = 1.7;
        config.recognition.model = "gigantic".to_string();
        config.render.width = 1081;

        config.normalize();

        assert_eq!(config.narration.speed, 8.0);
        assert_eq!(config.narration.words_per_minute, 150.0);
        assert_eq!(config.subtitles.max_lines, 1);
        assert_eq!(config.subtitles.max_words_per_chunk, 1);
        assert_eq!(config.subtitles.vertical_anchor, 1.0);
        assert_eq!(config.recognition.model, "base");
        assert_eq!(config.render.width, 1080);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = PipelineConfig::load_or_default(&temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(CoreError::ConfigError(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(CONFIG_FILE);

        let mut config = PipelineConfig::default();
        config.narration.speed = 1.0;
        config.recognition.model = "small".to_string();
        config.paths.font_path = Some(PathBuf::from("/fonts/bold.ttf"));
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_derived_options() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_options(), ChunkOptions::default());
        assert_eq!(config.whisper_model(), WhisperModel::Base);
        assert_eq!(
            config.transcription_options().language.as_deref(),
            Some("en")
        );
        assert_eq!(config.subtitle_style(), SubtitleStyle::default());
        assert_eq!(config.speaking_rate().words_per_minute(), 150.0);
    }

    #[test]
    fn test_serialization_is_camel_case() {
        let json = serde_json::to_string(&PipelineConfig::default()).unwrap();
        assert!(json.contains("\"maxWordsPerChunk\""));
        assert!(json.contains("\"outputDir\""));
        assert!(json.contains("\"videoCodec\""));
    }
}
