//! Pipeline Module
//!
//! Story in, vertical videos out:
//! - `backgrounds.rs`  - background video catalogue
//! - `segment.rs`      - one part: speech, word timing, subtitles, composition
//! - `orchestrator.rs` - budget fitting and the sequential part loop

mod backgrounds;
mod orchestrator;
mod segment;

use std::path::{Path, PathBuf};

pub use backgrounds::{
    list_background_videos, resolve_background, BackgroundClip, VIDEO_EXTENSIONS,
};
pub use orchestrator::{GenerateRequest, GenerationReport, Orchestrator};
pub use segment::{
    build_overlays, MediaSegmentRenderer, SegmentJob, SegmentOutcome, SegmentRenderer,
};

use crate::core::narration::{DurationBudget, Story};
use crate::core::settings::PipelineConfig;
use crate::core::tts::Voice;
use crate::core::TimeSec;

/// Renders a story with the production stages.
///
/// Returns the written files in part order; an empty list means nothing
/// was produced, including when FFmpeg or the font cannot be found.
pub async fn generate(
    config: &PipelineConfig,
    story: &Story,
    voice: Voice,
    background: &Path,
    budget: DurationBudget,
) -> Vec<PathBuf> {
    match Orchestrator::from_config(config.clone()) {
        Ok(orchestrator) => orchestrator.generate(story, voice, background, budget).await,
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "Pipeline setup failed");
            Vec::new()
        }
    }
}

/// Estimated narration seconds at the configured speaking rate
pub fn estimate_duration(config: &PipelineConfig, text: &str) -> TimeSec {
    config.speaking_rate().estimate_seconds(text)
}
