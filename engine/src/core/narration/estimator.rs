//! Speech duration estimation from word count.
//!
//! The same [`SpeakingRate`] drives both the estimate and the segmenter's
//! word budget, so truncation points always agree with previews.

use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

/// Approximate speaking rate of the synthesis backend at 1.0x
pub const DEFAULT_WORDS_PER_MINUTE: f64 = 150.0;

/// Fixed speaking rate in words per minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeakingRate {
    words_per_minute: f64,
}

impl SpeakingRate {
    /// Creates a rate; non-positive or non-finite values fall back to the default
    pub fn new(words_per_minute: f64) -> Self {
        if words_per_minute.is_finite() && words_per_minute > 0.0 {
            Self { words_per_minute }
        } else {
            Self::default()
        }
    }

    pub fn words_per_minute(&self) -> f64 {
        self.words_per_minute
    }

    /// Estimated seconds needed to speak `text`
    pub fn estimate_seconds(&self, text: &str) -> TimeSec {
        let words = text.split_whitespace().count();
        words as f64 / self.words_per_minute * 60.0
    }

    /// Largest word count that fits in `max_seconds`
    pub fn max_words(&self, max_seconds: TimeSec) -> usize {
        if !max_seconds.is_finite() || max_seconds <= 0.0 {
            return 0;
        }
        (max_seconds / 60.0 * self.words_per_minute).floor() as usize
    }
}

impl Default for SpeakingRate {
    fn default() -> Self {
        Self {
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
        }
    }
}

/// Estimates narration duration at the default speaking rate.
///
/// Pure function of the whitespace-delimited word count; empty text is 0s.
pub fn estimate_duration(text: &str) -> TimeSec {
    SpeakingRate::default().estimate_seconds(text)
}
