//! Caption Timing Module
//!
//! Derives subtitle timing from rendered speech:
//! - Audio decoding and preparation for recognition
//! - Word-level recognition through Whisper
//! - Grouping of recognized words into display chunks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption Timing                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  audio.rs      - Decode, downmix, resample, normalize           │
//! │  whisper.rs    - Word recognizer and process-wide model cache   │
//! │  chunker.rs    - Word timestamps -> adjacent display chunks     │
//! │  models.rs     - WordTimestamp, SubtitleChunk, Color            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
mod chunker;
mod models;
pub mod whisper;

pub use audio::{decode_audio_file, AudioExtractionError, DecodedAudio};
pub use chunker::{build_chunks, ChunkOptions, DEFAULT_MAX_WORDS_PER_CHUNK, MIN_CHUNK_DURATION};
pub use models::{Color, SubtitleChunk, WordTimestamp};
pub use whisper::{
    shared_recognizer, TranscriptionOptions, WhisperError, WhisperModel, WordRecognizer,
};
