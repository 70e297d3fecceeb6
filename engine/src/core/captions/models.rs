//! Caption Data Models
//!
//! Defines the timed-text structures flowing from recognition to overlay:
//! word timestamps produced by the recognizer and the display chunks built
//! from them.

use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

// =============================================================================
// Word Timestamps
// =============================================================================

/// A recognized word with its position in the audio track
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    /// Word text, trimmed (may carry trailing punctuation)
    pub word: String,
    /// Start time in seconds
    pub start: TimeSec,
    /// End time in seconds
    pub end: TimeSec,
}

impl WordTimestamp {
    /// Creates a word timestamp; `end` is raised to `start` if it precedes it
    pub fn new(word: impl Into<String>, start: TimeSec, end: TimeSec) -> Self {
        Self {
            word: word.into(),
            start,
            end: end.max(start),
        }
    }

    /// Whether the word closes a sentence
    pub fn ends_sentence(&self) -> bool {
        self.word.ends_with(['.', '!', '?'])
    }
}

// =============================================================================
// Subtitle Chunks
// =============================================================================

/// A display unit covering a fixed, non-overlapping time window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtitleChunk {
    /// Space-joined words
    pub text: String,
    /// Start time in seconds
    pub start: TimeSec,
    /// End time in seconds (exclusive)
    pub end: TimeSec,
}

impl SubtitleChunk {
    pub fn new(text: impl Into<String>, start: TimeSec, end: TimeSec) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Returns the chunk duration in seconds
    pub fn duration(&self) -> TimeSec {
        self.end - self.start
    }

    /// Checks if the chunk is on screen at the given time (half-open window)
    pub fn is_visible_at(&self, time_sec: TimeSec) -> bool {
        time_sec >= self.start && time_sec < self.end
    }

    /// Checks if this chunk's window overlaps another's
    pub fn overlaps(&self, other: &SubtitleChunk) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// =============================================================================
// Colors
// =============================================================================

/// RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn white() -> Self {
        Self::rgba(255, 255, 255, 255)
    }

    pub fn black() -> Self {
        Self::rgba(0, 0, 0, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_timestamp_clamps_end() {
        let word = WordTimestamp::new("hi", 2.0, 1.5);
        assert_eq!(word.end, 2.0);
    }

    #[test]
    fn test_word_ends_sentence() {
        assert!(WordTimestamp::new("done.", 0.0, 1.0).ends_sentence());
        assert!(WordTimestamp::new("what?", 0.0, 1.0).ends_sentence());
        assert!(!WordTimestamp::new("well,", 0.0, 1.0).ends_sentence());
    }

    #[test]
    fn test_chunk_visibility_is_half_open() {
        let chunk = SubtitleChunk::new("Hello world", 1.0, 2.0);
        assert!(chunk.is_visible_at(1.0));
        assert!(chunk.is_visible_at(1.5));
        assert!(!chunk.is_visible_at(2.0));
        assert_eq!(chunk.duration(), 1.0);
    }

    #[test]
    fn test_adjacent_chunks_do_not_overlap() {
        let a = SubtitleChunk::new("a", 0.0, 1.0);
        let b = SubtitleChunk::new("b", 1.0, 2.0);
        let c = SubtitleChunk::new("c", 0.5, 1.5);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }
}
