//! Subtitle Text Module
//!
//! Turns chunk text into overlay images:
//! - `wrap.rs`   - pixel-width greedy wrapping over a `TextMeasurer`
//! - `raster.rs` - fontdue glyph rendering, stroke outline, RGBA strips
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::core::text::{SubtitleFont, SubtitleRenderer, SubtitleStyle};
//!
//! let style = SubtitleStyle::default();
//! let font = SubtitleFont::load(path, style.font_size, style.stroke_width)?;
//! let renderer = SubtitleRenderer::new(font, style, 1080);
//! let image = renderer.render("Hello there.")?;
//! ```

mod raster;
mod wrap;

pub use raster::{
    find_system_font, layout_strip, system_font_candidates, StripLayout, SubtitleFont,
    SubtitleImage, SubtitleRenderer, SubtitleStyle,
};
pub use wrap::{wrap_lines, TextMeasurer};
