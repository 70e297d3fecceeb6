//! Subtitle rasterization.
//!
//! Each chunk becomes a transparent RGBA strip the width of the video with
//! up to three centered lines. Glyph coverage is drawn once, dilated by the
//! stroke width for the outline, then composited as a dark stroke under a
//! light fill. The strip height follows from the line count and the font's
//! line metrics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings, Metrics};
use serde::{Deserialize, Serialize};

use super::wrap::{wrap_lines, TextMeasurer};
use crate::core::captions::Color;
use crate::core::{CoreError, CoreResult};

/// Extra padding above and below the text block, on top of the stroke
const VERTICAL_PADDING: u32 = 14;

/// Gap between lines as a fraction of the line height
const LINE_SPACING_RATIO: f64 = 0.25;

// =============================================================================
// Style
// =============================================================================

/// Visual parameters for subtitle strips
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtitleStyle {
    /// Font size in pixels
    pub font_size: f32,
    /// Outline thickness in pixels
    pub stroke_width: u32,
    /// Horizontal margin on each side of the text box
    pub margin_px: u32,
    /// Line cap; the last line absorbs overflow
    pub max_lines: usize,
    pub fill: Color,
    pub stroke: Color,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_size: 66.0,
            stroke_width: 5,
            margin_px: 80,
            max_lines: 3,
            fill: Color::white(),
            stroke: Color::black(),
        }
    }
}

// =============================================================================
// Font
// =============================================================================

/// A loaded TrueType/OpenType font at a fixed size.
///
/// Measurements include the stroke so wrapped lines fit with their outline.
pub struct SubtitleFont {
    font: Font,
    size: f32,
    stroke: u32,
}

impl std::fmt::Debug for SubtitleFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtitleFont")
            .field("size", &self.size)
            .field("stroke", &self.stroke)
            .finish_non_exhaustive()
    }
}

impl SubtitleFont {
    /// Loads a font file
    pub fn load(path: &Path, size: f32, stroke: u32) -> CoreResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            CoreError::FontLoadFailed(format!("{}: {}", path.display(), e))
        })?;
        Self::from_bytes(bytes, size, stroke)
            .map_err(|e| CoreError::FontLoadFailed(format!("{}: {}", path.display(), e)))
    }

    /// Loads the configured font, or the first bold sans font found on the system
    pub fn load_or_system(path: Option<&Path>, size: f32, stroke: u32) -> CoreResult<Self> {
        match path {
            Some(path) => Self::load(path, size, stroke),
            None => {
                let found = find_system_font().ok_or_else(|| {
                    CoreError::FontLoadFailed(
                        "No font configured and no system font found".to_string(),
                    )
                })?;
                Self::load(&found, size, stroke)
            }
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, size: f32, stroke: u32) -> CoreResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| CoreError::FontLoadFailed(e.to_string()))?;
        Ok(Self {
            font,
            size: size.max(1.0),
            stroke,
        })
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn stroke(&self) -> u32 {
        self.stroke
    }

    /// Ascent above the baseline in pixels
    fn ascent(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.size)
            .map(|m| m.ascent)
            .unwrap_or(self.size * 0.8)
    }

    /// Pen advance for `text` without stroke
    fn advance(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut prev: Option<char> = None;
        for c in text.chars() {
            if let Some(p) = prev {
                width += self.font.horizontal_kern(p, c, self.size).unwrap_or(0.0);
            }
            width += self.font.metrics(c, self.size).advance_width;
            prev = Some(c);
        }
        width
    }

    /// Draws `text` into a coverage mask with its left pen position at `x`
    /// and its baseline at `baseline`
    fn draw_coverage(
        &self,
        mask: &mut CoverageMask,
        text: &str,
        x: f32,
        baseline: f32,
        cache: &mut HashMap<char, (Metrics, Vec<u8>)>,
    ) {
        let mut pen = x;
        let mut prev: Option<char> = None;
        for c in text.chars() {
            if let Some(p) = prev {
                pen += self.font.horizontal_kern(p, c, self.size).unwrap_or(0.0);
            }
            let (metrics, bitmap) = cache
                .entry(c)
                .or_insert_with(|| self.font.rasterize(c, self.size));

            let left = (pen + metrics.xmin as f32).round() as i32;
            let top = (baseline - (metrics.height as i32 + metrics.ymin) as f32).round() as i32;
            mask.stamp(left, top, metrics.width, metrics.height, bitmap);

            pen += metrics.advance_width;
            prev = Some(c);
        }
    }
}

impl TextMeasurer for SubtitleFont {
    fn text_width(&self, text: &str) -> u32 {
        self.advance(text).ceil().max(0.0) as u32 + 2 * self.stroke
    }

    fn line_height(&self) -> u32 {
        let glyph_height = match self.font.horizontal_line_metrics(self.size) {
            Some(m) => m.ascent - m.descent,
            None => self.size * 1.2,
        };
        glyph_height.ceil() as u32 + 2 * self.stroke
    }
}

/// Common bold sans-serif font locations
pub fn system_font_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
        "/Library/Fonts/Arial Bold.ttf",
        "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
        "C:\\Windows\\Fonts\\arialbd.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(font_dir) = dirs::font_dir() {
        candidates.push(font_dir.join("arialbd.ttf"));
        candidates.push(font_dir.join("DejaVuSans-Bold.ttf"));
    }
    candidates
}

/// First existing entry of [`system_font_candidates`]
pub fn find_system_font() -> Option<PathBuf> {
    system_font_candidates().into_iter().find(|p| p.is_file())
}

// =============================================================================
// Layout
// =============================================================================

/// Where each wrapped line goes inside the strip
#[derive(Clone, Debug, PartialEq)]
pub struct StripLayout {
    pub width: u32,
    pub height: u32,
    /// Top-left corner of each line box (stroke included)
    pub origins: Vec<(i32, i32)>,
    pub line_height: u32,
}

/// Centers `lines` horizontally in a strip `canvas_width` wide.
pub fn layout_strip<M: TextMeasurer + ?Sized>(
    measurer: &M,
    lines: &[String],
    canvas_width: u32,
    stroke: u32,
) -> StripLayout {
    let line_height = measurer.line_height();
    let spacing = (line_height as f64 * LINE_SPACING_RATIO) as u32;
    let v_pad = stroke + VERTICAL_PADDING;

    let n = lines.len() as u32;
    let height = n * line_height + n.saturating_sub(1) * spacing + 2 * v_pad;

    let origins = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let line_width = measurer.text_width(line) as i32;
            let x = (canvas_width as i32 - line_width) / 2;
            let y = (v_pad + i as u32 * (line_height + spacing)) as i32;
            (x, y)
        })
        .collect();

    StripLayout {
        width: canvas_width,
        height,
        origins,
        line_height,
    }
}

// =============================================================================
// Coverage Masks
// =============================================================================

/// Single-channel 8-bit coverage buffer
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CoverageMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CoverageMask {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub(crate) fn get(&self, x: i32, y: i32) -> u8 {
        self.index(x, y).map(|i| self.data[i]).unwrap_or(0)
    }

    pub(crate) fn set_max(&mut self, x: i32, y: i32, value: u8) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = self.data[i].max(value);
        }
    }

    /// Merges a glyph bitmap with its top-left corner at (`left`, `top`)
    fn stamp(&mut self, left: i32, top: i32, width: usize, height: usize, bitmap: &[u8]) {
        for row in 0..height {
            for col in 0..width {
                let value = bitmap[row * width + col];
                if value > 0 {
                    self.set_max(left + col as i32, top + row as i32, value);
                }
            }
        }
    }

    /// Grows coverage by a disc of `radius` pixels
    pub(crate) fn dilate(&self, radius: u32) -> CoverageMask {
        if radius == 0 {
            return self.clone();
        }

        let r = radius as i32;
        let offsets: Vec<(i32, i32)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .collect();

        let mut out = CoverageMask::new(self.width, self.height);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let value = self.get(x, y);
                if value == 0 {
                    continue;
                }
                for (dx, dy) in &offsets {
                    out.set_max(x + dx, y + dy, value);
                }
            }
        }
        out
    }
}

// =============================================================================
// Images
// =============================================================================

/// Straight-alpha RGBA raster
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl SubtitleImage {
    /// Pixel at (`x`, `y`) as `[r, g, b, a]`
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    /// Whether any pixel is non-transparent
    pub fn has_ink(&self) -> bool {
        self.rgba.chunks_exact(4).any(|px| px[3] > 0)
    }

    /// Writes the raw RGBA bytes (FFmpeg `-f rawvideo -pix_fmt rgba`)
    pub fn write_raw(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.rgba)
    }
}

/// Composites `fill` coverage over `stroke` coverage.
pub(crate) fn composite(
    fill_mask: &CoverageMask,
    stroke_mask: &CoverageMask,
    fill: Color,
    stroke: Color,
) -> SubtitleImage {
    let mut rgba = vec![0u8; fill_mask.data.len() * 4];

    for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
        let fa = fill_mask.data[i] as f32 / 255.0 * fill.a as f32 / 255.0;
        let sa = stroke_mask.data[i] as f32 / 255.0 * stroke.a as f32 / 255.0;
        let out_a = fa + sa * (1.0 - fa);
        if out_a <= 0.0 {
            continue;
        }
        let mix = |f: u8, s: u8| -> u8 {
            ((f as f32 * fa + s as f32 * sa * (1.0 - fa)) / out_a)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        px[0] = mix(fill.r, stroke.r);
        px[1] = mix(fill.g, stroke.g);
        px[2] = mix(fill.b, stroke.b);
        px[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    SubtitleImage {
        width: fill_mask.width,
        height: fill_mask.height,
        rgba,
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Rasterizes chunk text into subtitle strips for one video width
pub struct SubtitleRenderer {
    font: SubtitleFont,
    style: SubtitleStyle,
    canvas_width: u32,
}

impl SubtitleRenderer {
    pub fn new(font: SubtitleFont, style: SubtitleStyle, canvas_width: u32) -> Self {
        Self {
            font,
            style,
            canvas_width,
        }
    }

    /// Width available to text after margins
    pub fn box_width(&self) -> u32 {
        self.canvas_width
            .saturating_sub(2 * self.style.margin_px)
            .max(1)
    }

    /// Wrapped lines for `text`
    pub fn wrap(&self, text: &str) -> Vec<String> {
        wrap_lines(&self.font, text, self.box_width(), self.style.max_lines)
    }

    /// Renders `text` to a transparent strip
    pub fn render(&self, text: &str) -> CoreResult<SubtitleImage> {
        let lines = self.wrap(text);
        if lines.is_empty() {
            return Err(CoreError::RasterizationFailed(
                "Subtitle text is empty".to_string(),
            ));
        }

        let stroke = self.font.stroke();
        let layout = layout_strip(&self.font, &lines, self.canvas_width, stroke);
        let ascent = self.font.ascent();

        let mut fill_mask = CoverageMask::new(layout.width, layout.height);
        let mut cache = HashMap::new();
        for (line, (x, y)) in lines.iter().zip(&layout.origins) {
            let pen_x = (*x + stroke as i32) as f32;
            let baseline = (*y + stroke as i32) as f32 + ascent;
            self.font
                .draw_coverage(&mut fill_mask, line, pen_x, baseline, &mut cache);
        }

        let stroke_mask = fill_mask.dilate(stroke);
        Ok(composite(
            &fill_mask,
            &stroke_mask,
            self.style.fill,
            self.style.stroke,
        ))
    }
}
