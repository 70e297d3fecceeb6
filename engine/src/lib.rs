//! StoryReel Core Library
//!
//! Story text in, short vertical videos out. Narration is synthesized,
//! re-timed word by word with speech recognition, chunked into subtitles
//! and composited over a looping background clip.
//!
//! The public entry points are [`generate`] and [`estimate_duration`];
//! [`core::pipeline::Orchestrator`] exposes the same flow with an
//! injectable segment renderer.

pub mod core;

pub use crate::core::narration::{DurationBudget, Story};
pub use crate::core::pipeline::{
    estimate_duration, generate, list_background_videos, GenerateRequest, GenerationReport,
    Orchestrator, SegmentOutcome,
};
pub use crate::core::settings::PipelineConfig;
pub use crate::core::tts::Voice;
pub use crate::core::{CoreError, CoreResult};
