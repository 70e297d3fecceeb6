//! Per-segment rendering.
//!
//! One segment runs Synthesize -> Extract -> Chunk -> Rasterize ->
//! Composite in a private scratch directory that is removed when the
//! segment finishes, whether it succeeded or not.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::backgrounds::BackgroundClip;
use crate::core::captions::whisper::{resolve_model_path, shared_recognizer};
use crate::core::captions::{
    build_chunks, SubtitleChunk, TranscriptionOptions, WordRecognizer, WordTimestamp,
};
use crate::core::ffmpeg::{detect_ffmpeg, FFmpegRunner};
use crate::core::render::{
    center_crop_rect, overlay_top, plan_background_window, BackgroundWindow, CompositionEngine,
    CompositionPlan, OverlayInput,
};
use crate::core::settings::PipelineConfig;
use crate::core::text::{SubtitleFont, SubtitleImage, SubtitleRenderer};
use crate::core::tts::{GoogleTranslateTts, SpeechBackend, SpeechSynthesizer, SpeechTrack, Voice};
use crate::core::{CoreError, CoreResult, Ratio};

// =============================================================================
// Jobs and Outcomes
// =============================================================================

/// One text part bound for one output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentJob {
    /// 1-based part number
    pub index: usize,
    /// Number of parts in the run
    pub total: usize,
    /// Narration for this part, announcement included
    pub text: String,
    pub voice: Voice,
    pub background: BackgroundClip,
    pub output: PathBuf,
}

/// Result of one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SegmentOutcome {
    Rendered {
        part: usize,
        path: PathBuf,
    },
    Failed {
        part: usize,
        stage: String,
        reason: String,
    },
}

impl SegmentOutcome {
    pub fn part(&self) -> usize {
        match self {
            SegmentOutcome::Rendered { part, .. } | SegmentOutcome::Failed { part, .. } => *part,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SegmentOutcome::Rendered { path, .. } => Some(path),
            SegmentOutcome::Failed { .. } => None,
        }
    }
}

/// Renders one segment to its output file
#[async_trait]
pub trait SegmentRenderer: Send + Sync {
    /// Checks the background once per run, before any part is rendered
    async fn probe_background(&self, path: &Path) -> CoreResult<BackgroundClip>;

    async fn render(&self, job: &SegmentJob) -> CoreResult<PathBuf>;
}

// =============================================================================
// Media Renderer
// =============================================================================

/// Production renderer: speech backend, Whisper, fontdue and FFmpeg
pub struct MediaSegmentRenderer {
    runner: FFmpegRunner,
    synthesizer: SpeechSynthesizer,
    recognizer: Option<Arc<dyn WordRecognizer>>,
    model_path: PathBuf,
    subtitles: Arc<SubtitleRenderer>,
    composer: CompositionEngine,
    config: PipelineConfig,
    rng: Mutex<StdRng>,
}

impl MediaSegmentRenderer {
    /// Builds every stage from configuration.
    ///
    /// FFmpeg and the font are resolved now; the Whisper model is loaded on
    /// the first segment.
    pub fn from_config(config: &PipelineConfig) -> CoreResult<Self> {
        let info = detect_ffmpeg(config.paths.ffmpeg_path.as_deref())?;
        let runner = FFmpegRunner::new(info);

        let style = config.subtitle_style();
        let font = SubtitleFont::load_or_system(
            config.paths.font_path.as_deref(),
            style.font_size,
            style.stroke_width,
        )?;
        let subtitles = Arc::new(SubtitleRenderer::new(font, style, config.render.width));

        let backend: Arc<dyn SpeechBackend> = Arc::new(GoogleTranslateTts::new()?);
        let synthesizer =
            SpeechSynthesizer::new(backend, runner.clone(), config.narration.speed);

        let model_path = resolve_model_path(
            config.whisper_model(),
            config.recognition.model_path.as_deref(),
        );

        Ok(Self {
            composer: CompositionEngine::new(runner.clone()),
            runner,
            synthesizer,
            recognizer: None,
            model_path,
            subtitles,
            config: config.clone(),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Replaces the speech backend
    pub fn with_backend(mut self, backend: Arc<dyn SpeechBackend>) -> Self {
        self.synthesizer =
            SpeechSynthesizer::new(backend, self.runner.clone(), self.config.narration.speed);
        self
    }

    /// Uses `recognizer` instead of the process-wide Whisper model
    pub fn with_recognizer(mut self, recognizer: Arc<dyn WordRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Fixes the background offset sequence
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn plan_window(
        &self,
        background_duration: f64,
        audio_duration: f64,
    ) -> CoreResult<BackgroundWindow> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CoreError::Internal("Background RNG lock poisoned".to_string()))?;
        plan_background_window(background_duration, audio_duration, &mut *rng)
    }

    /// Synthesize, Extract, Chunk and Rasterize for one job
    async fn narrate(&self, job: &SegmentJob, scratch: &Path) -> CoreResult<NarratedSegment> {
        let track = self
            .synthesizer
            .synthesize(&job.text, job.voice, scratch)
            .await?;
        info!(
            part = job.index,
            total = job.total,
            duration = track.duration(),
            "Synthesized narration"
        );

        let words = self.recognize(track.audio.for_recognition()).await?;
        let chunks = build_chunks(&words, track.duration(), self.config.chunk_options());
        debug!(
            part = job.index,
            words = words.len(),
            chunks = chunks.len(),
            "Built subtitle chunks"
        );

        let overlays = self.rasterize(&chunks, scratch).await?;
        Ok(NarratedSegment { track, overlays })
    }

    async fn recognize(&self, samples: Vec<f32>) -> CoreResult<Vec<WordTimestamp>> {
        let injected = self.recognizer.clone();
        let model_path = self.model_path.clone();
        let options: TranscriptionOptions = self.config.transcription_options();

        let words = tokio::task::spawn_blocking(move || {
            let recognizer: Arc<dyn WordRecognizer> = match injected {
                Some(recognizer) => recognizer,
                None => {
                    let engine: Arc<dyn WordRecognizer> = shared_recognizer(&model_path)?;
                    engine
                }
            };
            debug!(
                model = recognizer.model_name(),
                samples = samples.len(),
                "Recognizing narration"
            );
            recognizer.recognize(&samples, &options)
        })
        .await
        .map_err(|e| CoreError::RecognitionFailed(format!("Recognition task failed: {}", e)))??;

        if words.is_empty() {
            return Err(CoreError::RecognitionFailed(
                "No words recognized in narration".to_string(),
            ));
        }
        Ok(words)
    }

    async fn rasterize(
        &self,
        chunks: &[SubtitleChunk],
        scratch: &Path,
    ) -> CoreResult<Vec<OverlayInput>> {
        let renderer = Arc::clone(&self.subtitles);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let dir = scratch.to_path_buf();

        let rendered = tokio::task::spawn_blocking(
            move || -> CoreResult<Vec<(PathBuf, SubtitleImage)>> {
                texts
                    .iter()
                    .enumerate()
                    .map(|(i, text)| {
                        let image = renderer.render(text)?;
                        let path = dir.join(format!("chunk_{:04}.rgba", i));
                        image.write_raw(&path)?;
                        Ok((path, image))
                    })
                    .collect()
            },
        )
        .await
        .map_err(|e| CoreError::RasterizationFailed(format!("Raster task failed: {}", e)))??;

        let subs = &self.config.subtitles;
        Ok(build_overlays(
            chunks,
            rendered,
            self.config.render.height,
            subs.vertical_anchor,
            subs.vertical_offset_px,
        ))
    }
}

/// Narration audio plus its subtitle overlays
struct NarratedSegment {
    track: SpeechTrack,
    overlays: Vec<OverlayInput>,
}

/// Pairs rasterized strips with their chunk windows and screen position
pub fn build_overlays(
    chunks: &[SubtitleChunk],
    rendered: Vec<(PathBuf, SubtitleImage)>,
    frame_height: u32,
    anchor: f64,
    offset_px: u32,
) -> Vec<OverlayInput> {
    let y = overlay_top(frame_height, anchor, offset_px);
    chunks
        .iter()
        .zip(rendered)
        .map(|(chunk, (path, image))| OverlayInput {
            path,
            width: image.width,
            height: image.height,
            x: 0,
            y,
            start: chunk.start,
            end: chunk.end,
        })
        .collect()
}

#[async_trait]
impl SegmentRenderer for MediaSegmentRenderer {
    async fn probe_background(&self, path: &Path) -> CoreResult<BackgroundClip> {
        let media = self.runner.probe(path).await.map_err(|e| {
            CoreError::InvalidInput(format!(
                "Background is not a readable video: {}: {}",
                path.display(),
                e
            ))
        })?;
        BackgroundClip::from_media(path, &media)
    }

    async fn render(&self, job: &SegmentJob) -> CoreResult<PathBuf> {
        let scratch = tempfile::Builder::new().prefix("storyreel-").tempdir()?;
        let narrated = self.narrate(job, scratch.path()).await?;

        let background = &job.background;
        let window = self.plan_window(background.duration_sec, narrated.track.duration())?;
        let target = Ratio::new(self.config.render.width, self.config.render.height);

        let plan = CompositionPlan {
            background: background.path.clone(),
            crop: center_crop_rect(background.width, background.height, target),
            window,
            narration: narrated.track.path.clone(),
            overlays: narrated.overlays,
            settings: self.config.render.clone(),
            output: job.output.clone(),
        };

        let output = self.composer.compose(&plan).await?;
        drop(scratch);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::core::captions::whisper::WhisperResult;
    use crate::core::ffmpeg::detect_ffmpeg;
    use crate::core::text::find_system_font;

    /// Two seconds of a 440 Hz tone as WAV bytes
    struct ToneBackend;

    #[async_trait]
    impl SpeechBackend for ToneBackend {
        fn name(&self) -> &str {
            "tone"
        }

        async fn synthesize(&self, _text: &str, _voice: Voice) -> CoreResult<Vec<u8>> {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 22_050,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut cursor = std::io::Cursor::new(Vec::new());
            {
                let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
                for i in 0..44_100 {
                    let t = i as f32 / 22_050.0;
                    let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
                    writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
                }
                writer.finalize().unwrap();
            }
            Ok(cursor.into_inner())
        }
    }

    /// Fixed word timings for "Part one begins. Then it ends."
    struct ScriptedRecognizer;

    impl WordRecognizer for ScriptedRecognizer {
        fn recognize(
            &self,
            _samples: &[f32],
            _options: &TranscriptionOptions,
        ) -> WhisperResult<Vec<WordTimestamp>> {
            Ok(vec![
                WordTimestamp::new("Part", 0.0, 0.2),
                WordTimestamp::new("one", 0.2, 0.4),
                WordTimestamp::new("begins.", 0.4, 0.8),
                WordTimestamp::new("Then", 0.9, 1.1),
                WordTimestamp::new("it", 1.1, 1.2),
                WordTimestamp::new("ends.", 1.2, 1.6),
            ])
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// Production renderer with stub speech and recognition.
    ///
    /// `None` where FFmpeg or a system font is missing.
    fn stubbed_renderer(seed: u64) -> Option<MediaSegmentRenderer> {
        if detect_ffmpeg(None).is_err() || find_system_font().is_none() {
            return None;
        }
        let mut config = PipelineConfig::default();
        config.narration.speed = 1.0;
        let renderer = MediaSegmentRenderer::from_config(&config).unwrap();
        Some(
            renderer
                .with_backend(Arc::new(ToneBackend))
                .with_recognizer(Arc::new(ScriptedRecognizer))
                .with_seed(seed),
        )
    }

    fn job(text: &str) -> SegmentJob {
        SegmentJob {
            index: 1,
            total: 1,
            text: text.to_string(),
            voice: Voice::Us,
            background: BackgroundClip {
                path: PathBuf::from("/bg/city.mp4"),
                duration_sec: 10.0,
                width: 1920,
                height: 1080,
            },
            output: PathBuf::from("/out/story.mp4"),
        }
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = SegmentOutcome::Rendered {
            part: 1,
            path: PathBuf::from("/out/a_part1.mp4"),
        };
        let failed = SegmentOutcome::Failed {
            part: 2,
            stage: "synthesize".to_string(),
            reason: "offline".to_string(),
        };
        assert_eq!(ok.part(), 1);
        assert_eq!(ok.path(), Some(Path::new("/out/a_part1.mp4")));
        assert_eq!(failed.part(), 2);
        assert!(failed.path().is_none());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let failed = SegmentOutcome::Failed {
            part: 3,
            stage: "composite".to_string(),
            reason: "encoder exited".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["part"], 3);
    }

    #[test]
    fn test_build_overlays_positions_and_windows() {
        let chunks = vec![
            SubtitleChunk::new("Hello there.", 0.0, 1.2),
            SubtitleChunk::new("How are you?", 1.2, 2.5),
        ];
        let rendered = chunks
            .iter()
            .enumerate()
            .map(|(i, _)| {
                (
                    PathBuf::from(format!("/tmp/chunk_{:04}.rgba", i)),
                    SubtitleImage {
                        width: 1080,
                        height: 120 + i as u32,
                        rgba: Vec::new(),
                    },
                )
            })
            .collect();

        let overlays = build_overlays(&chunks, rendered, 1920, 0.85, 40);
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].y, 1592);
        assert_eq!(overlays[0].x, 0);
        assert_eq!(overlays[1].height, 121);
        assert_eq!(overlays[0].end, overlays[1].start);
        assert_eq!(overlays[1].end, 2.5);
    }

    #[tokio::test]
    async fn test_narrate_with_stub_stages_is_repeatable() {
        let Some(renderer) = stubbed_renderer(7) else {
            return;
        };
        let job = job("Part one begins. Then it ends.");

        let first_dir = TempDir::new().unwrap();
        let second_dir = TempDir::new().unwrap();
        let first = renderer.narrate(&job, first_dir.path()).await.unwrap();
        let second = renderer.narrate(&job, second_dir.path()).await.unwrap();

        let windows = |n: &NarratedSegment| -> Vec<(f64, f64, u32)> {
            n.overlays.iter().map(|o| (o.start, o.end, o.height)).collect()
        };
        assert_eq!(windows(&first), windows(&second));

        assert!((first.track.duration() - 2.0).abs() < 0.1);
        assert_eq!(first.overlays.len(), 2);
        assert_eq!(first.overlays[0].start, 0.0);
        assert_eq!(first.overlays[0].end, first.overlays[1].start);
        assert_eq!(first.overlays[1].end, first.track.duration());
        assert!(first.overlays.iter().all(|o| o.path.is_file()));
    }

    #[tokio::test]
    async fn test_seeded_background_windows_repeat() {
        let (Some(a), Some(b)) = (stubbed_renderer(42), stubbed_renderer(42)) else {
            return;
        };
        let windows_a: Vec<BackgroundWindow> =
            (0..3).map(|_| a.plan_window(7.0, 30.0).unwrap()).collect();
        let windows_b: Vec<BackgroundWindow> =
            (0..3).map(|_| b.plan_window(7.0, 30.0).unwrap()).collect();

        assert_eq!(windows_a, windows_b);
        for window in &windows_a {
            assert_eq!(window.loops, 5);
            assert!(window.start >= 0.0 && window.start < 5.0);
        }
    }

    #[tokio::test]
    async fn test_probe_rejects_unreadable_background() {
        let Some(renderer) = stubbed_renderer(1) else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let broken = temp_dir.path().join("broken.mp4");
        std::fs::write(&broken, b"not a video").unwrap();

        let result = renderer.probe_background(&broken).await;
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }
}
