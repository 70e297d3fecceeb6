//! Narration Module
//!
//! Prepares story text for speech and fits it to a duration budget:
//! - `estimator.rs` - word-count based duration estimate
//! - `segmenter.rs` - truncate / split policies over sentences
//! - `story.rs`     - story record, markdown cleanup, output naming

mod estimator;
mod segmenter;
mod story;

pub use estimator::{estimate_duration, SpeakingRate, DEFAULT_WORDS_PER_MINUTE};
pub use segmenter::{
    estimate_part_count, segment, split_into_parts, split_sentences, truncate_to_budget,
    DurationBudget,
};
pub use story::{announce_part, clean_markdown, part_file_name, slugify, Story};
