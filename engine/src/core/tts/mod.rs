//! Speech Synthesis Module
//!
//! Turns narration text into a speed-adjusted audio track:
//! - `voice.rs`       - accent variants
//! - `backend.rs`     - `SpeechBackend` trait and the Google Translate backend
//! - `tempo.rs`       - pitch-preserving `atempo` chains
//! - `synthesizer.rs` - backend + speed change + decode into a `SpeechTrack`

mod backend;
mod synthesizer;
mod tempo;
mod voice;

pub use backend::{split_for_requests, GoogleTranslateTts, SpeechBackend, MAX_REQUEST_CHARS};
pub use synthesizer::{SpeechSynthesizer, SpeechTrack, DEFAULT_NARRATION_SPEED};
pub use tempo::{atempo_filter, atempo_stages};
pub use voice::Voice;
