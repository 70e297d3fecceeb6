//! StoryReel Core Type Definitions
//!
//! Small value types shared by the pipeline stages.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Time in seconds (floating point)
pub type TimeSec = f64;

// =============================================================================
// Frame Geometry
// =============================================================================

/// Aspect ratio as `num:den`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub num: u32,
    pub den: u32,
}

impl Ratio {
    /// Zero denominators are replaced with 1
    pub fn new(num: u32, den: u32) -> Self {
        if den == 0 {
            warn!(num, "Ratio with zero denominator, using {}:1", num);
            return Self { num, den: 1 };
        }
        Self { num, den }
    }

    /// 9:16 portrait
    pub fn vertical() -> Self {
        Self { num: 9, den: 16 }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::vertical()
    }
}

/// Source-pixel rectangle kept by the crop stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// The whole `width` x `height` frame
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// FFmpeg `crop` filter for this rectangle
    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_zero_denominator() {
        let ratio = Ratio::new(9, 0);
        assert_eq!(ratio.den, 1);
        assert_eq!(ratio.as_f64(), 9.0);
    }

    #[test]
    fn test_ratio_from_render_size() {
        assert_eq!(Ratio::new(1080, 1920).as_f64(), Ratio::vertical().as_f64());
    }

    #[test]
    fn test_crop_filter() {
        let crop = CropRect {
            x: 656,
            y: 0,
            width: 607,
            height: 1080,
        };
        assert_eq!(crop.filter(), "crop=607:1080:656:0");
        assert_eq!(CropRect::full(1080, 1920).filter(), "crop=1080:1920:0:0");
    }
}
