//! Story records and narration text preparation.
//!
//! Turns a fetched story into speakable plain text and derives the
//! deterministic output file names for each rendered part.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum slug length taken from the title
const SLUG_MAX_CHARS: usize = 40;

/// Slug used when the title has no usable characters
const FALLBACK_SLUG: &str = "story";

/// Story record supplied by the content-fetching layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Story {
    pub title: String,
    pub full_body: String,
}

impl Story {
    pub fn new(title: impl Into<String>, full_body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            full_body: full_body.into(),
        }
    }

    /// Title and body as one speakable string with markdown removed
    pub fn narration_text(&self) -> String {
        clean_markdown(&format!("{}. {}", self.title, self.full_body))
    }

    /// File-name-safe stem derived from the title
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*+").expect("valid emphasis regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#+\s*").expect("valid heading regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]\(.*?\)").expect("valid link regex"));
static NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+").expect("valid newline regex"));

/// Strips emphasis markers, heading markers and links, then flattens newlines
pub fn clean_markdown(text: &str) -> String {
    let text = EMPHASIS.replace_all(text, "");
    let text = HEADING.replace_all(&text, "");
    let text = LINK.replace_all(&text, "");
    let text = NEWLINES.replace_all(&text, " ");
    text.trim().to_string()
}

/// Keeps word characters, whitespace and `-`, caps at 40 chars, joins with `_`
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .take(SLUG_MAX_CHARS)
        .collect();
    let slug = kept.trim().replace(' ', "_");
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// `<stem>.mp4` for a single output, `<stem>_part<N>.mp4` when split
pub fn part_file_name(stem: &str, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{}_part{}.mp4", stem, index)
    } else {
        format!("{}.mp4", stem)
    }
}

/// Prefixes "Part i of N." so viewers can follow a multi-part story
pub fn announce_part(text: &str, index: usize, total: usize) -> String {
    if total > 1 {
        format!("Part {} of {}. {}", index, total, text)
    } else {
        text.to_string()
    }
}
