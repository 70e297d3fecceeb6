//! StoryReel Core Engine
//!
//! Narration-to-subtitle sync and duration-aware segmentation.
//! Turns a story into one or more vertical videos with burned-in,
//! word-timed subtitles.

pub mod captions;
pub mod ffmpeg;
pub mod narration;
pub mod pipeline;
pub mod process;
pub mod render;
pub mod settings;
pub mod text;
pub mod tts;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
