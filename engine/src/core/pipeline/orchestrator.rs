//! Render orchestration.
//!
//! Prepares narration, fits it to the duration budget and renders one output
//! per text part. A failing part is logged and skipped; the run only yields
//! nothing when the input is unusable or every part fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::backgrounds::{resolve_background, BackgroundClip};
use super::segment::{MediaSegmentRenderer, SegmentJob, SegmentOutcome, SegmentRenderer};
use crate::core::narration::{
    announce_part, estimate_part_count, part_file_name, segment, slugify, DurationBudget, Story,
};
use crate::core::settings::PipelineConfig;
use crate::core::tts::Voice;
use crate::core::{CoreError, CoreResult, TimeSec};

// =============================================================================
// Requests and Reports
// =============================================================================

/// Everything needed to render one story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub story: Story,
    #[serde(default)]
    pub voice: Voice,
    /// File name inside the background directory, or a path
    pub background: PathBuf,
    #[serde(default)]
    pub budget: DurationBudget,
    /// Output stem used instead of the title slug
    #[serde(default)]
    pub output_name: Option<String>,
}

impl GenerateRequest {
    pub fn new(
        story: Story,
        voice: Voice,
        background: impl Into<PathBuf>,
        budget: DurationBudget,
    ) -> Self {
        Self {
            story,
            voice,
            background: background.into(),
            budget,
            output_name: None,
        }
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// File stem for outputs: the explicit name when usable, else the title slug
    pub fn output_stem(&self) -> String {
        match self.output_name.as_deref().map(slugify) {
            Some(stem) if !stem.is_empty() => stem,
            _ => self.story.slug(),
        }
    }
}

/// Per-part outcomes of one run, in part order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub outcomes: Vec<SegmentOutcome>,
}

impl GenerationReport {
    /// Output files that were written, in part order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| o.path().map(Path::to_path_buf))
            .collect()
    }

    pub fn requested(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.path().is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.requested() - self.succeeded()
    }

    pub fn is_partial(&self) -> bool {
        self.succeeded() > 0 && self.failed() > 0
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives text parts through a [`SegmentRenderer`] one after another
pub struct Orchestrator {
    config: PipelineConfig,
    renderer: Arc<dyn SegmentRenderer>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, renderer: Arc<dyn SegmentRenderer>) -> Self {
        Self { config, renderer }
    }

    /// Production orchestrator backed by [`MediaSegmentRenderer`]
    pub fn from_config(config: PipelineConfig) -> CoreResult<Self> {
        let renderer = MediaSegmentRenderer::from_config(&config)?;
        Ok(Self::new(config, Arc::new(renderer)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Estimated narration seconds at the configured speaking rate
    pub fn estimate_duration(&self, text: &str) -> TimeSec {
        self.config.speaking_rate().estimate_seconds(text)
    }

    /// Estimated part count for a story under `budget`
    pub fn preview_parts(&self, story: &Story, budget: DurationBudget) -> usize {
        estimate_part_count(
            &story.narration_text(),
            budget,
            self.config.speaking_rate(),
        )
    }

    /// Splits the story into jobs without rendering anything
    pub fn plan(
        &self,
        request: &GenerateRequest,
        background: &BackgroundClip,
    ) -> CoreResult<Vec<SegmentJob>> {
        let narration = request.story.narration_text();
        if !narration.chars().any(char::is_alphanumeric) {
            return Err(CoreError::InvalidInput(
                "Story has no narratable text".to_string(),
            ));
        }

        let parts = segment(&narration, request.budget, self.config.speaking_rate());
        let total = parts.len();
        let stem = request.output_stem();

        Ok(parts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let index = i + 1;
                SegmentJob {
                    index,
                    total,
                    text: announce_part(&text, index, total),
                    voice: request.voice,
                    background: background.clone(),
                    output: self
                        .config
                        .paths
                        .output_dir
                        .join(part_file_name(&stem, index, total)),
                }
            })
            .collect())
    }

    /// Renders every part and reports each outcome.
    ///
    /// Input errors (missing or unreadable background, empty story,
    /// unwritable output directory) are returned before any part is
    /// rendered. Part failures are recorded in the report.
    pub async fn run(&self, request: &GenerateRequest) -> CoreResult<GenerationReport> {
        let path = resolve_background(&request.background, &self.config.paths.background_dir)?;
        let background = self.renderer.probe_background(&path).await?;
        let jobs = self.plan(request, &background)?;
        tokio::fs::create_dir_all(&self.config.paths.output_dir).await?;

        info!(
            title = %request.story.title,
            parts = jobs.len(),
            split = request.budget.allow_split,
            max_seconds = request.budget.max_seconds,
            "Starting generation"
        );

        let mut report = GenerationReport::default();
        for job in &jobs {
            let outcome = match self.renderer.render(job).await {
                Ok(path) => {
                    info!(part = job.index, total = job.total, path = %path.display(), "Part rendered");
                    SegmentOutcome::Rendered {
                        part: job.index,
                        path,
                    }
                }
                Err(e) => {
                    error!(
                        part = job.index,
                        total = job.total,
                        stage = e.stage(),
                        error = %e,
                        "Part failed, skipping"
                    );
                    SegmentOutcome::Failed {
                        part: job.index,
                        stage: e.stage().to_string(),
                        reason: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        if report.succeeded() == 0 {
            warn!(title = %request.story.title, "No parts rendered");
        } else if report.is_partial() {
            warn!(
                succeeded = report.succeeded(),
                requested = report.requested(),
                "Generation finished with failed parts"
            );
        }

        Ok(report)
    }

    /// Renders the story and returns the written files in part order.
    ///
    /// An empty list means nothing was produced.
    pub async fn generate(
        &self,
        story: &Story,
        voice: Voice,
        background: &Path,
        budget: DurationBudget,
    ) -> Vec<PathBuf> {
        let request = GenerateRequest::new(story.clone(), voice, background, budget);
        self.generate_request(&request).await
    }

    /// [`Orchestrator::generate`] for a prepared request
    pub async fn generate_request(&self, request: &GenerateRequest) -> Vec<PathBuf> {
        match self.run(request).await {
            Ok(report) => report.paths(),
            Err(e) => {
                error!(stage = e.stage(), error = %e, "Generation aborted");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::core::ffmpeg::{FFmpegError, MediaInfo, VideoStreamInfo};

    /// Records jobs and fails the configured parts
    struct MockRenderer {
        fail_parts: HashSet<usize>,
        /// Probe result; `None` behaves like an unreadable file
        media: Option<MediaInfo>,
        probed: Mutex<Vec<PathBuf>>,
        seen: Mutex<Vec<SegmentJob>>,
    }

    impl MockRenderer {
        fn new(fail_parts: &[usize]) -> Self {
            Self::with_media(
                fail_parts,
                Some(MediaInfo {
                    duration_sec: 45.0,
                    video: Some(VideoStreamInfo {
                        width: 1920,
                        height: 1080,
                        fps: 30.0,
                    }),
                    has_audio: true,
                }),
            )
        }

        fn with_media(fail_parts: &[usize], media: Option<MediaInfo>) -> Self {
            Self {
                fail_parts: fail_parts.iter().copied().collect(),
                media,
                probed: Mutex::new(Vec::new()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SegmentRenderer for MockRenderer {
        async fn probe_background(&self, path: &Path) -> CoreResult<BackgroundClip> {
            self.probed.lock().unwrap().push(path.to_path_buf());
            match &self.media {
                Some(media) => BackgroundClip::from_media(path, media),
                None => Err(CoreError::InvalidInput(
                    FFmpegError::ProbeError("Invalid data found when processing input".into())
                        .to_string(),
                )),
            }
        }

        async fn render(&self, job: &SegmentJob) -> CoreResult<PathBuf> {
            self.seen.lock().unwrap().push(job.clone());
            if self.fail_parts.contains(&job.index) {
                return Err(CoreError::SynthesisFailed("backend offline".to_string()));
            }
            std::fs::write(&job.output, b"mp4").unwrap();
            Ok(job.output.clone())
        }
    }

    struct Fixture {
        _dir: TempDir,
        config: PipelineConfig,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.paths.output_dir = dir.path().join("out");
        config.paths.background_dir = dir.path().join("bg");
        std::fs::create_dir_all(&config.paths.background_dir).unwrap();
        std::fs::write(config.paths.background_dir.join("city.mp4"), b"x").unwrap();
        Fixture { _dir: dir, config }
    }

    fn story_with_sentences(count: usize) -> Story {
        let sentence = format!("{}.", vec!["word"; 25].join(" "));
        Story::new("My Story", vec![sentence; count].join(" "))
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_split_scenario_yields_three_parts() {
        let fx = fixture();
        let renderer = Arc::new(MockRenderer::new(&[]));
        let orchestrator = Orchestrator::new(fx.config.clone(), renderer.clone());

        let story = story_with_sentences(31);
        assert!(orchestrator.estimate_duration(&story.narration_text()) > 300.0);

        let paths = orchestrator
            .generate(&story, Voice::Us, Path::new("city.mp4"), DurationBudget::split(120.0))
            .await;

        assert_eq!(
            file_names(&paths),
            vec!["My_Story_part1.mp4", "My_Story_part2.mp4", "My_Story_part3.mp4"]
        );
        let seen = renderer.seen.lock().unwrap();
        for (i, job) in seen.iter().enumerate() {
            assert!(job.text.starts_with(&format!("Part {} of 3. ", i + 1)));
            assert_eq!(job.total, 3);
        }
        assert!(seen[0].text.contains("My Story."));
    }

    #[tokio::test]
    async fn test_truncate_scenario_yields_single_output() {
        let fx = fixture();
        let renderer = Arc::new(MockRenderer::new(&[]));
        let orchestrator = Orchestrator::new(fx.config.clone(), renderer.clone());

        let story = story_with_sentences(15);
        assert!(orchestrator.estimate_duration(&story.narration_text()) > 120.0);

        let paths = orchestrator
            .generate(
                &story,
                Voice::Uk,
                Path::new("city.mp4"),
                DurationBudget::truncate(120.0),
            )
            .await;

        assert_eq!(file_names(&paths), vec!["My_Story.mp4"]);
        let seen = renderer.seen.lock().unwrap();
        assert!(!seen[0].text.starts_with("Part"));
        assert!(orchestrator.estimate_duration(&seen[0].text) <= 120.0);
        assert_eq!(seen[0].voice, Voice::Uk);
    }

    #[tokio::test]
    async fn test_failed_part_is_skipped() {
        let fx = fixture();
        let orchestrator = Orchestrator::new(fx.config.clone(), Arc::new(MockRenderer::new(&[2])));
        let request = GenerateRequest::new(
            story_with_sentences(31),
            Voice::Us,
            "city.mp4",
            DurationBudget::split(120.0),
        );

        let report = orchestrator.run(&request).await.unwrap();
        assert_eq!(report.requested(), 3);
        assert_eq!(report.succeeded(), 2);
        assert!(report.is_partial());
        assert_eq!(
            file_names(&report.paths()),
            vec!["My_Story_part1.mp4", "My_Story_part3.mp4"]
        );
        match &report.outcomes[1] {
            SegmentOutcome::Failed { part, stage, .. } => {
                assert_eq!(*part, 2);
                assert_eq!(stage, "synthesize");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_parts_failing_returns_empty() {
        let fx = fixture();
        let orchestrator =
            Orchestrator::new(fx.config.clone(), Arc::new(MockRenderer::new(&[1, 2, 3])));
        let paths = orchestrator
            .generate(
                &story_with_sentences(31),
                Voice::Us,
                Path::new("city.mp4"),
                DurationBudget::split(120.0),
            )
            .await;
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn test_missing_background_fails_before_rendering() {
        let fx = fixture();
        let renderer = Arc::new(MockRenderer::new(&[]));
        let orchestrator = Orchestrator::new(fx.config.clone(), renderer.clone());

        let paths = orchestrator
            .generate(
                &story_with_sentences(3),
                Voice::Us,
                Path::new("missing.mp4"),
                DurationBudget::default(),
            )
            .await;

        assert!(paths.is_empty());
        assert!(renderer.probed.lock().unwrap().is_empty());
        assert!(renderer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_background_fails_before_rendering() {
        let fx = fixture();
        let broken = fx.config.paths.background_dir.join("broken.mp4");
        std::fs::write(&broken, b"not a video").unwrap();
        let renderer = Arc::new(MockRenderer::with_media(&[], None));
        let orchestrator = Orchestrator::new(fx.config.clone(), renderer.clone());
        let request = GenerateRequest::new(
            story_with_sentences(31),
            Voice::Us,
            "broken.mp4",
            DurationBudget::split(120.0),
        );

        let result = orchestrator.run(&request).await;
        match result {
            Err(e) => assert_eq!(e.stage(), "input"),
            Ok(report) => panic!("expected input error, got {:?}", report),
        }
        assert_eq!(*renderer.probed.lock().unwrap(), vec![broken]);
        assert!(renderer.seen.lock().unwrap().is_empty());
        assert!(!fx.config.paths.output_dir.exists());
    }

    #[tokio::test]
    async fn test_background_without_video_stream_fails_before_rendering() {
        let fx = fixture();
        let audio_only = MediaInfo {
            duration_sec: 30.0,
            video: None,
            has_audio: true,
        };
        let renderer = Arc::new(MockRenderer::with_media(&[], Some(audio_only)));
        let orchestrator = Orchestrator::new(fx.config.clone(), renderer.clone());

        let paths = orchestrator
            .generate(
                &story_with_sentences(31),
                Voice::Us,
                Path::new("city.mp4"),
                DurationBudget::split(120.0),
            )
            .await;

        assert!(paths.is_empty());
        assert_eq!(renderer.probed.lock().unwrap().len(), 1);
        assert!(renderer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_background_probed_once_per_run() {
        let fx = fixture();
        let renderer = Arc::new(MockRenderer::new(&[]));
        let orchestrator = Orchestrator::new(fx.config.clone(), renderer.clone());

        let paths = orchestrator
            .generate(
                &story_with_sentences(31),
                Voice::Us,
                Path::new("city.mp4"),
                DurationBudget::split(120.0),
            )
            .await;

        assert_eq!(paths.len(), 3);
        assert_eq!(renderer.probed.lock().unwrap().len(), 1);
        let seen = renderer.seen.lock().unwrap();
        assert!(seen.iter().all(|job| job.background.duration_sec == 45.0));
    }

    #[tokio::test]
    async fn test_empty_story_returns_empty() {
        let fx = fixture();
        let renderer = Arc::new(MockRenderer::new(&[]));
        let orchestrator = Orchestrator::new(fx.config.clone(), renderer.clone());

        let paths = orchestrator
            .generate(
                &Story::new("", "**"),
                Voice::Us,
                Path::new("city.mp4"),
                DurationBudget::default(),
            )
            .await;

        assert!(paths.is_empty());
        assert!(renderer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_plan_uses_output_name_override() {
        let fx = fixture();
        let orchestrator = Orchestrator::new(fx.config.clone(), Arc::new(MockRenderer::new(&[])));
        let request = GenerateRequest::new(
            Story::new("Ignored Title", "Short body."),
            Voice::Ca,
            "city.mp4",
            DurationBudget::default(),
        )
        .with_output_name("custom name");

        let clip = BackgroundClip {
            path: PathBuf::from("/bg/city.mp4"),
            duration_sec: 30.0,
            width: 1920,
            height: 1080,
        };
        let jobs = orchestrator.plan(&request, &clip).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].output, fx.config.paths.output_dir.join("custom_name.mp4"));
        assert_eq!(jobs[0].background, clip);
        assert_eq!(jobs[0].text, "Ignored Title. Short body.");
    }

    #[test]
    fn test_preview_parts_matches_split() {
        let fx = fixture();
        let orchestrator = Orchestrator::new(fx.config, Arc::new(MockRenderer::new(&[])));
        let story = story_with_sentences(31);
        assert_eq!(orchestrator.preview_parts(&story, DurationBudget::split(120.0)), 3);
        assert_eq!(orchestrator.preview_parts(&story, DurationBudget::truncate(120.0)), 1);
    }
}
