//! Sentence-aware narration segmentation.
//!
//! Two policies share one greedy walk over sentences:
//! - truncate: keep the sentences that fit, drop the rest (always at least one)
//! - split: start a new part whenever the next sentence would overflow
//!
//! Sentences are never broken; a single sentence larger than the budget
//! becomes its own oversized part.

use serde::{Deserialize, Serialize};

use super::estimator::SpeakingRate;
use crate::core::TimeSec;

// =============================================================================
// Duration Budget
// =============================================================================

/// Maximum length of one output and what to do with overflow
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationBudget {
    /// Upper bound per output in seconds
    pub max_seconds: TimeSec,
    /// Split overflow into further parts instead of truncating
    pub allow_split: bool,
}

impl DurationBudget {
    pub fn truncate(max_seconds: TimeSec) -> Self {
        Self {
            max_seconds,
            allow_split: false,
        }
    }

    pub fn split(max_seconds: TimeSec) -> Self {
        Self {
            max_seconds,
            allow_split: true,
        }
    }

    /// Named duration modes offered to users
    ///
    /// * `1` - under 2 minutes, single video
    /// * `2` - under 3 minutes, single video
    /// * `3` - under 5 minutes per part, split into parts
    pub fn preset(key: &str) -> Option<Self> {
        match key.trim() {
            "1" => Some(Self::truncate(120.0)),
            "2" => Some(Self::truncate(180.0)),
            "3" => Some(Self::split(300.0)),
            _ => None,
        }
    }

    /// Display label for a preset key
    pub fn preset_label(key: &str) -> Option<&'static str> {
        match key.trim() {
            "1" => Some("Under 2 minutes"),
            "2" => Some("Under 3 minutes"),
            "3" => Some("Under 5 minutes"),
            _ => None,
        }
    }
}

impl Default for DurationBudget {
    fn default() -> Self {
        Self::truncate(120.0)
    }
}

// =============================================================================
// Sentence Splitting
// =============================================================================

fn ends_sentence(word: &str) -> bool {
    word.ends_with(['.', '!', '?'])
}

/// Splits text into sentences terminated by `.`, `!` or `?`.
///
/// Internal whitespace is collapsed to single spaces. A trailing fragment
/// without terminal punctuation is kept as the last sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        current.push(word);
        if ends_sentence(word) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        sentences.push(current.join(" "));
    }

    sentences
}

fn word_count(sentence: &str) -> usize {
    sentence.split_whitespace().count()
}

// =============================================================================
// Policies
// =============================================================================

/// Keeps as many leading sentences as fit within `max_seconds`.
///
/// Always returns at least the first sentence, even when it alone is over
/// budget. Empty input yields an empty string.
pub fn truncate_to_budget(text: &str, max_seconds: TimeSec, rate: SpeakingRate) -> String {
    let max_words = rate.max_words(max_seconds);
    let mut kept: Vec<String> = Vec::new();
    let mut count = 0usize;

    for sentence in split_sentences(text) {
        let words = word_count(&sentence);
        if count + words > max_words && !kept.is_empty() {
            break;
        }
        count += words;
        kept.push(sentence);
    }

    kept.join(" ")
}

/// Partitions text into ordered parts that each fit within `max_seconds`.
///
/// Concatenating the parts reproduces the original sentence sequence.
pub fn split_into_parts(text: &str, max_seconds: TimeSec, rate: SpeakingRate) -> Vec<String> {
    let max_words = rate.max_words(max_seconds);
    let mut parts = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut count = 0usize;

    for sentence in split_sentences(text) {
        let words = word_count(&sentence);
        if count + words > max_words && !current.is_empty() {
            parts.push(current.join(" "));
            current.clear();
            count = 0;
        }
        count += words;
        current.push(sentence);
    }

    if !current.is_empty() {
        parts.push(current.join(" "));
    }

    parts
}

/// Applies the budget's policy and returns the text parts to render.
///
/// Text that already fits is returned unchanged as a single part.
pub fn segment(text: &str, budget: DurationBudget, rate: SpeakingRate) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if rate.estimate_seconds(text) <= budget.max_seconds {
        return vec![text.to_string()];
    }

    if budget.allow_split {
        split_into_parts(text, budget.max_seconds, rate)
    } else {
        vec![truncate_to_budget(text, budget.max_seconds, rate)]
    }
}

/// Quick part-count preview from the estimate alone (no sentence walk).
///
/// A remainder of five seconds or less is folded into the previous part.
pub fn estimate_part_count(text: &str, budget: DurationBudget, rate: SpeakingRate) -> usize {
    if !budget.allow_split || budget.max_seconds <= 0.0 {
        return 1;
    }
    let estimated = rate.estimate_seconds(text);
    let whole = (estimated / budget.max_seconds).floor() as usize;
    let remainder = estimated % budget.max_seconds;
    (whole + usize::from(remainder > 5.0)).max(1)
}
