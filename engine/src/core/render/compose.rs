//! Segment Composition
//!
//! Builds and runs the single FFmpeg invocation that turns a background
//! clip, a narration track and a stack of subtitle strips into one vertical
//! video. The background is looped until it covers the narration, a random
//! window is cut from it, center-cropped to the output aspect and scaled.
//! Each strip is overlaid on its half-open chunk window.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, warn};

use crate::core::ffmpeg::{FFmpegRunner, RenderSettings};
use crate::core::{CoreError, CoreResult, CropRect, Ratio, TimeSec};

// =============================================================================
// Background Planning
// =============================================================================

/// Slice of the (looped) background used for one segment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackgroundWindow {
    /// Total plays of the background clip (1 = no looping)
    pub loops: u32,
    /// Offset into the looped background in seconds
    pub start: TimeSec,
    /// Length of the slice in seconds
    pub duration: TimeSec,
}

impl BackgroundWindow {
    /// Extra plays requested from FFmpeg's `-stream_loop`
    pub fn extra_loops(&self) -> u32 {
        self.loops.saturating_sub(1)
    }
}

/// Chooses how often to loop the background and where to start in it.
///
/// The clip is repeated `floor(audio / background) + 1` times, then a start
/// offset is drawn uniformly from `[0, looped - audio]`.
pub fn plan_background_window<R: Rng>(
    background_duration: TimeSec,
    audio_duration: TimeSec,
    rng: &mut R,
) -> CoreResult<BackgroundWindow> {
    if background_duration.is_nan() || background_duration <= 0.0 {
        return Err(CoreError::InvalidInput(format!(
            "Background has no usable duration ({})",
            background_duration
        )));
    }
    let audio_duration = audio_duration.max(0.0);

    let loops = (audio_duration / background_duration).floor() as u32 + 1;
    let looped = background_duration * loops as f64;
    let slack = (looped - audio_duration).max(0.0);
    let start = if slack > 0.0 {
        rng.gen_range(0.0..slack)
    } else {
        0.0
    };

    Ok(BackgroundWindow {
        loops,
        start,
        duration: audio_duration,
    })
}

/// Largest centered rectangle of `ratio` inside a `width` x `height` frame
pub fn center_crop_rect(width: u32, height: u32, ratio: Ratio) -> CropRect {
    let target = ratio.as_f64();
    if width == 0 || height == 0 || target <= 0.0 {
        return CropRect::full(width, height);
    }

    let current = width as f64 / height as f64;
    if current > target {
        let new_width = ((height as f64 * target) as u32).clamp(1, width);
        CropRect {
            x: (width - new_width) / 2,
            y: 0,
            width: new_width,
            height,
        }
    } else {
        let new_height = ((width as f64 / target) as u32).clamp(1, height);
        CropRect {
            x: 0,
            y: (height - new_height) / 2,
            width,
            height: new_height,
        }
    }
}

/// Top edge of a subtitle strip: `height * anchor - offset`, never above the frame
pub fn overlay_top(frame_height: u32, anchor: f64, offset_px: u32) -> u32 {
    let anchored = (frame_height as f64 * anchor.clamp(0.0, 1.0)) as i64;
    (anchored - offset_px as i64).max(0) as u32
}

// =============================================================================
// Composition Plan
// =============================================================================

/// A rasterized subtitle strip on disk and its display window
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayInput {
    /// Raw RGBA file
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub start: TimeSec,
    pub end: TimeSec,
}

/// Everything needed to encode one segment
#[derive(Clone, Debug)]
pub struct CompositionPlan {
    pub background: PathBuf,
    pub crop: CropRect,
    pub window: BackgroundWindow,
    pub narration: PathBuf,
    pub overlays: Vec<OverlayInput>,
    pub settings: RenderSettings,
    pub output: PathBuf,
}

/// Temporary name the encoder writes to before the final rename
pub fn partial_output_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn secs(value: TimeSec) -> String {
    format!("{:.3}", value)
}

impl CompositionPlan {
    /// The `-filter_complex` graph; the final video label is `[vout]`
    pub fn filter_graph(&self) -> String {
        let mut graph = format!(
            "[0:v]{},scale={}:{},setsar=1",
            self.crop.filter(),
            self.settings.width,
            self.settings.height
        );

        if self.overlays.is_empty() {
            graph.push_str("[vout]");
            return graph;
        }
        graph.push_str("[base]");

        let mut previous = "base".to_string();
        for (i, overlay) in self.overlays.iter().enumerate() {
            // Inputs 0 and 1 are background and narration
            let input = i + 2;
            let label = if i + 1 == self.overlays.len() {
                "vout".to_string()
            } else {
                format!("v{}", i)
            };
            graph.push_str(&format!(
                ";[{}][{}:v]overlay={}:{}:enable='gte(t,{})*lt(t,{})'[{}]",
                previous,
                input,
                overlay.x,
                overlay.y,
                secs(overlay.start),
                secs(overlay.end),
                label
            ));
            previous = label;
        }
        graph
    }

    /// Full FFmpeg argument list, writing to the partial output path
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string()];

        // Background: loop, seek, cut
        args.extend([
            "-stream_loop".to_string(),
            self.window.extra_loops().to_string(),
            "-ss".to_string(),
            secs(self.window.start),
            "-t".to_string(),
            secs(self.window.duration),
            "-i".to_string(),
            self.background.to_string_lossy().to_string(),
        ]);

        args.extend(["-i".to_string(), self.narration.to_string_lossy().to_string()]);

        for overlay in &self.overlays {
            args.extend([
                "-f".to_string(),
                "rawvideo".to_string(),
                "-pix_fmt".to_string(),
                "rgba".to_string(),
                "-s".to_string(),
                format!("{}x{}", overlay.width, overlay.height),
                "-i".to_string(),
                overlay.path.to_string_lossy().to_string(),
            ]);
        }

        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph(),
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
        ]);
        args.extend(self.settings.codec_args());
        args.extend([
            "-t".to_string(),
            secs(self.window.duration),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            partial_output_path(&self.output)
                .to_string_lossy()
                .to_string(),
        ]);

        args
    }
}

// =============================================================================
// Composition Engine
// =============================================================================

/// Runs composition plans through FFmpeg
pub struct CompositionEngine {
    ffmpeg: FFmpegRunner,
}

impl CompositionEngine {
    pub fn new(ffmpeg: FFmpegRunner) -> Self {
        Self { ffmpeg }
    }

    /// Encodes `plan` and moves the result into place.
    ///
    /// The output path only ever holds a complete file; a failed encode
    /// removes its partial output.
    pub async fn compose(&self, plan: &CompositionPlan) -> CoreResult<PathBuf> {
        if let Some(parent) = plan.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let partial = partial_output_path(&plan.output);
        let args = plan.build_args();
        debug!(
            overlays = plan.overlays.len(),
            duration = plan.window.duration,
            "Encoding segment to {}",
            plan.output.display()
        );

        if let Err(e) = self.ffmpeg.run(&args, "Segment encode").await {
            discard_partial(&partial).await;
            return Err(CoreError::CompositionFailed(e.to_string()));
        }

        match tokio::fs::metadata(&partial).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                discard_partial(&partial).await;
                return Err(CoreError::CompositionFailed(
                    "Encoder produced no output".to_string(),
                ));
            }
        }

        tokio::fs::rename(&partial, &plan.output).await?;
        Ok(plan.output.clone())
    }
}

async fn discard_partial(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial output {}: {}", partial.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::core::ffmpeg::FFmpegInfo;

    fn plan(overlays: Vec<OverlayInput>) -> CompositionPlan {
        CompositionPlan {
            background: PathBuf::from("/bg/city.mp4"),
            crop: CropRect {
                x: 656,
                y: 0,
                width: 607,
                height: 1080,
            },
            window: BackgroundWindow {
                loops: 3,
                start: 12.5,
                duration: 70.25,
            },
            narration: PathBuf::from("/tmp/seg/speech.mp3"),
            overlays,
            settings: RenderSettings::shorts_1080p(),
            output: PathBuf::from("/out/story_part1.mp4"),
        }
    }

    fn overlay(i: usize, start: f64, end: f64) -> OverlayInput {
        OverlayInput {
            path: PathBuf::from(format!("/tmp/seg/chunk_{}.rgba", i)),
            width: 1080,
            height: 200,
            x: 0,
            y: 1592,
            start,
            end,
        }
    }

    #[test]
    fn test_background_loops_to_cover_audio() {
        let mut rng = StdRng::seed_from_u64(7);
        let window = plan_background_window(30.0, 70.0, &mut rng).unwrap();
        assert_eq!(window.loops, 3);
        assert_eq!(window.extra_loops(), 2);
        assert!(window.start >= 0.0 && window.start <= 20.0);
        assert!(window.start + window.duration <= 90.0);
    }

    #[test]
    fn test_background_longer_than_audio() {
        let mut rng = StdRng::seed_from_u64(1);
        let window = plan_background_window(600.0, 60.0, &mut rng).unwrap();
        assert_eq!(window.loops, 1);
        assert!(window.start < 540.0);
    }

    #[test]
    fn test_background_exact_multiple() {
        let mut rng = StdRng::seed_from_u64(3);
        // 60 / 30 = 2 -> three plays, 30 s of slack
        let window = plan_background_window(30.0, 60.0, &mut rng).unwrap();
        assert_eq!(window.loops, 3);
        assert!(window.start < 30.0);
    }

    #[test]
    fn test_background_window_is_seeded() {
        let a = plan_background_window(45.0, 100.0, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = plan_background_window(45.0, 100.0, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_background_without_duration() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(plan_background_window(0.0, 10.0, &mut rng).is_err());
        assert!(plan_background_window(f64::NAN, 10.0, &mut rng).is_err());
    }

    #[test]
    fn test_center_crop_landscape() {
        let crop = center_crop_rect(1920, 1080, Ratio::vertical());
        assert_eq!(crop.height, 1080);
        assert_eq!(crop.width, 607);
        assert_eq!(crop.x, (1920 - 607) / 2);
        assert_eq!(crop.y, 0);
    }

    #[test]
    fn test_center_crop_tall() {
        let crop = center_crop_rect(1080, 2400, Ratio::vertical());
        assert_eq!(crop.width, 1080);
        assert_eq!(crop.height, 1920);
        assert_eq!(crop.y, 240);
    }

    #[test]
    fn test_center_crop_already_vertical() {
        let crop = center_crop_rect(1080, 1920, Ratio::vertical());
        assert_eq!(
            crop,
            CropRect {
                x: 0,
                y: 0,
                width: 1080,
                height: 1920
            }
        );
    }

    #[test]
    fn test_overlay_top() {
        assert_eq!(overlay_top(1920, 0.85, 40), 1592);
        assert_eq!(overlay_top(100, 0.1, 40), 0);
    }

    #[test]
    fn test_filter_graph_without_overlays() {
        let graph = plan(vec![]).filter_graph();
        assert_eq!(graph, "[0:v]crop=607:1080:656:0,scale=1080:1920,setsar=1[vout]");
    }

    #[test]
    fn test_filter_graph_chains_overlays() {
        let graph = plan(vec![overlay(0, 0.0, 1.2), overlay(1, 1.2, 3.0)]).filter_graph();
        assert!(graph.contains(
            "[base][2:v]overlay=0:1592:enable='gte(t,0.000)*lt(t,1.200)'[v0]"
        ));
        assert!(graph.contains(
            "[v0][3:v]overlay=0:1592:enable='gte(t,1.200)*lt(t,3.000)'[vout]"
        ));
    }

    #[test]
    fn test_build_args_layout() {
        let args = plan(vec![overlay(0, 0.0, 2.0)]).build_args();

        let loop_idx = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(args[loop_idx + 1], "2");
        assert_eq!(args[loop_idx + 3], "12.500");
        assert_eq!(args[loop_idx + 5], "70.250");
        assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "1080x200"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "1:a"));
        assert_eq!(args.last().unwrap(), "/out/story_part1.mp4.part");
    }

    #[test]
    fn test_partial_output_path() {
        assert_eq!(
            partial_output_path(Path::new("/out/a.mp4")),
            PathBuf::from("/out/a.mp4.part")
        );
    }

    #[tokio::test]
    async fn test_failed_encode_leaves_no_output() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let engine = CompositionEngine::new(FFmpegRunner::new(FFmpegInfo {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            version: "test".to_string(),
        }));

        let mut plan = plan(vec![]);
        plan.output = temp_dir.path().join("story.mp4");
        std::fs::write(partial_output_path(&plan.output), b"stale").unwrap();

        let result = engine.compose(&plan).await;
        assert!(matches!(result, Err(CoreError::CompositionFailed(_))));
        assert!(!plan.output.exists());
        assert!(!partial_output_path(&plan.output).exists());
    }
}
