pub mod error;
pub mod noise;
pub mod pattern;
pub mod playback;
pub mod quad;
pub mod reference;
pub mod stimulus;
pub mod transform;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use error::StimError;

// ---------------------------------------------------------------------------
// DrawParams: everything a single quad draw depends on besides the texture
// ---------------------------------------------------------------------------

/// Per-draw configuration handed to every render call.
///
/// Nothing here lives in global GPU state: the GPU renderer uploads it into
/// the uniform buffer right before the draw, and the CPU reference renderer
/// reads it directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawParams {
    /// Multiplies vertex x/y before rasterisation.
    pub scale: Vec2,
    /// Multiplies UV x before sampling.
    pub aspect_adjustment: f32,
    pub mode: ColorMode,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            scale: Vec2::ONE,
            aspect_adjustment: 1.0,
            mode: ColorMode::Grayscale,
        }
    }
}

impl DrawParams {
    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.mode = mode;
        self
    }
}

// ---------------------------------------------------------------------------
// Sampling options
// ---------------------------------------------------------------------------

/// How the sampled texel becomes the output colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// `(r, r, r, 1)`, monochrome checkerboard noise.
    #[default]
    Grayscale,
    /// `(r, g, b, a)` passed through unmodified.
    Color,
}

impl ColorMode {
    /// Single-channel patterns have no green/blue data to pass through, so
    /// they are always drawn in grayscale.
    pub fn effective_for(self, channels: pattern::Channels) -> Self {
        match channels {
            pattern::Channels::Gray => ColorMode::Grayscale,
            pattern::Channels::Rgba => self,
        }
    }
}

/// Out-of-range texture coordinate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    #[default]
    Clamp,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Channels;

    #[test]
    fn default_params_are_identity() {
        let p = DrawParams::default();
        assert_eq!(p.scale, Vec2::ONE);
        assert_eq!(p.aspect_adjustment, 1.0);
        assert_eq!(p.mode, ColorMode::Grayscale);
    }

    #[test]
    fn gray_patterns_force_grayscale() {
        assert_eq!(ColorMode::Color.effective_for(Channels::Gray), ColorMode::Grayscale);
        assert_eq!(ColorMode::Color.effective_for(Channels::Rgba), ColorMode::Color);
        assert_eq!(ColorMode::Grayscale.effective_for(Channels::Rgba), ColorMode::Grayscale);
    }

    #[test]
    fn modes_parse_from_lowercase_names() {
        #[derive(Deserialize)]
        struct Row {
            mode: ColorMode,
            edge: EdgeMode,
            filter: FilterMode,
        }
        let row: Row = toml::from_str("mode = \"color\"\nedge = \"repeat\"\nfilter = \"linear\"").unwrap();
        assert_eq!(row.mode, ColorMode::Color);
        assert_eq!(row.edge, EdgeMode::Repeat);
        assert_eq!(row.filter, FilterMode::Linear);
    }
}
