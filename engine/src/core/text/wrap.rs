//! Pixel-width line wrapping.
//!
//! Words are packed greedily into lines no wider than the available box.
//! When the line cap is reached the last line takes every remaining word,
//! so wrapping can overflow horizontally but never drops text.

/// Font metrics needed for layout
pub trait TextMeasurer {
    /// Rendered width of `text` in pixels
    fn text_width(&self, text: &str) -> u32;

    /// Height of one line in pixels
    fn line_height(&self) -> u32;
}

/// Wraps `text` into at most `max_lines` lines of width `max_width`.
///
/// A single word wider than `max_width` gets a line of its own.
pub fn wrap_lines<M: TextMeasurer + ?Sized>(
    measurer: &M,
    text: &str,
    max_width: u32,
    max_lines: usize,
) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if max_lines <= 1 {
        return vec![words.join(" ")];
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        let candidate = if current.is_empty() {
            (*word).to_string()
        } else {
            format!("{} {}", current.join(" "), word)
        };

        if measurer.text_width(&candidate) > max_width && !current.is_empty() {
            lines.push(current.join(" "));
            if lines.len() + 1 >= max_lines {
                current = words[i..].to_vec();
                break;
            }
            current = vec![*word];
        } else {
            current.push(word);
        }
    }

    if !current.is_empty() {
        lines.push(current.join(" "));
    }

    lines
}
