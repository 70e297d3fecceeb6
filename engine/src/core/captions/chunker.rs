//! Subtitle Chunking
//!
//! Groups recognized words into display chunks. Boundaries come from the
//! content (sentence ends, word cap); end times come from adjacency: each
//! chunk ends exactly where the next begins, and the last one ends with the
//! track. The recognizer's own end time for a chunk's last word is discarded
//! so consecutive subtitles never overlap.

use super::models::{SubtitleChunk, WordTimestamp};
use crate::core::TimeSec;

/// Default cap on words shown at once
pub const DEFAULT_MAX_WORDS_PER_CHUNK: usize = 14;

/// Shortest window a chunk may occupy
pub const MIN_CHUNK_DURATION: TimeSec = 0.05;

/// Chunking parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkOptions {
    /// Close a chunk once it holds this many words
    pub max_words_per_chunk: usize,
    /// Floor applied when adjacency yields a zero or negative window
    pub min_duration: TimeSec,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_words_per_chunk: DEFAULT_MAX_WORDS_PER_CHUNK,
            min_duration: MIN_CHUNK_DURATION,
        }
    }
}

/// Builds display chunks from word timestamps for a track of `track_duration`.
///
/// A chunk closes after a word ending in `.`, `!` or `?`, or once it holds
/// `max_words_per_chunk` words. Empty words are skipped.
pub fn build_chunks(
    words: &[WordTimestamp],
    track_duration: TimeSec,
    options: ChunkOptions,
) -> Vec<SubtitleChunk> {
    let max_words = options.max_words_per_chunk.max(1);

    // (text, start) pairs; ends are derived afterwards
    let mut groups: Vec<(String, TimeSec)> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_start: Option<TimeSec> = None;

    for word in words {
        let text = word.word.trim();
        if text.is_empty() {
            continue;
        }
        let start = *current_start.get_or_insert(word.start);
        current.push(text);

        if word.ends_sentence() || current.len() >= max_words {
            groups.push((current.join(" "), start));
            current.clear();
            current_start = None;
        }
    }

    if let Some(start) = current_start {
        groups.push((current.join(" "), start));
    }

    let next_starts: Vec<TimeSec> = groups
        .iter()
        .skip(1)
        .map(|(_, start)| *start)
        .chain(std::iter::once(track_duration))
        .collect();

    // A floored window pushes the following start forward so that
    // end == next start still holds. When the push reaches the last chunk
    // its end can pass the track duration; the encoder stops at the audio
    // length, so the tail of that window is never shown.
    let mut previous_end: TimeSec = 0.0;
    groups
        .into_iter()
        .zip(next_starts)
        .map(|((text, raw_start), next)| {
            let start = raw_start.max(previous_end);
            let end = next.max(start + options.min_duration);
            previous_end = end;
            SubtitleChunk::new(text, start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(spec: &[(&str, f64, f64)]) -> Vec<WordTimestamp> {
        spec.iter()
            .map(|(w, s, e)| WordTimestamp::new(*w, *s, *e))
            .collect()
    }

    fn assert_adjacent(chunks: &[SubtitleChunk], duration: f64) {
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(chunks.last().unwrap().end, duration);
    }

    #[test]
    fn test_empty_words() {
        assert!(build_chunks(&[], 10.0, ChunkOptions::default()).is_empty());
    }

    #[test]
    fn test_breaks_on_sentence_end() {
        let input = words(&[
            ("Hello", 0.0, 0.4),
            ("there.", 0.4, 0.9),
            ("How", 1.2, 1.4),
            ("are", 1.4, 1.6),
            ("you?", 1.6, 2.0),
        ]);
        let chunks = build_chunks(&input, 2.5, ChunkOptions::default());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Hello there.");
        assert_eq!(chunks[1].text, "How are you?");
        // Raw end of "there." (0.9) is replaced by the next start
        assert_eq!(chunks[0].end, 1.2);
        assert_adjacent(&chunks, 2.5);
    }

    #[test]
    fn test_breaks_on_max_words() {
        let input: Vec<WordTimestamp> = (0..10)
            .map(|i| WordTimestamp::new(format!("w{}", i), i as f64 * 0.3, i as f64 * 0.3 + 0.25))
            .collect();
        let options = ChunkOptions {
            max_words_per_chunk: 4,
            ..Default::default()
        };
        let chunks = build_chunks(&input, 3.2, options);

        let sizes: Vec<usize> = chunks.iter().map(|c| c.text.split(' ').count()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_adjacent(&chunks, 3.2);
    }

    #[test]
    fn test_skips_empty_words() {
        let input = words(&[("", 0.0, 0.1), ("  ", 0.1, 0.2), ("Hi.", 0.3, 0.5)]);
        let chunks = build_chunks(&input, 1.0, ChunkOptions::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hi.");
        assert_eq!(chunks[0].start, 0.3);
    }

    #[test]
    fn test_min_duration_floor() {
        // Two chunks starting at the same instant
        let input = words(&[("One.", 1.0, 1.0), ("Two.", 1.0, 1.0)]);
        let chunks = build_chunks(&input, 1.0, ChunkOptions::default());
        assert!((chunks[0].duration() - MIN_CHUNK_DURATION).abs() < 1e-12);
        assert!((chunks[1].duration() - MIN_CHUNK_DURATION).abs() < 1e-12);
        assert_eq!(chunks[0].end, chunks[1].start);
        // Floor cascades past the 1.0 s track
        assert!((chunks[1].end - (1.0 + 2.0 * MIN_CHUNK_DURATION)).abs() < 1e-9);
        assert!(chunks[1].end > 1.0);
    }

    #[test]
    fn test_trailing_words_without_punctuation_flush() {
        let input = words(&[("Done.", 0.0, 0.5), ("and", 0.6, 0.8), ("then", 0.8, 1.0)]);
        let chunks = build_chunks(&input, 1.4, ChunkOptions::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "and then");
        assert_adjacent(&chunks, 1.4);
    }

    #[test]
    fn test_chunk_boundaries_are_deterministic() {
        let input = words(&[("A", 0.0, 0.2), ("b.", 0.2, 0.4), ("C", 0.5, 0.7)]);
        let first = build_chunks(&input, 1.0, ChunkOptions::default());
        let second = build_chunks(&input, 1.0, ChunkOptions::default());
        assert_eq!(first, second);
    }
}
