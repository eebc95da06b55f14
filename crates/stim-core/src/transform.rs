use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{ColorMode, DrawParams};

// ---------------------------------------------------------------------------
// Configuration knobs
// ---------------------------------------------------------------------------

/// Vertex-space scale. Independent of [`AspectMode`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScaleMode {
    /// Quad fills the window.
    Off,
    /// Pattern is shown at its native pixel size, letterboxed in the window.
    #[default]
    Native,
    Fixed { x: f32, y: f32 },
}

/// UV-space horizontal adjustment. Independent of [`ScaleMode`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AspectMode {
    #[default]
    Off,
    /// `window_width / window_height`.
    Window,
    Fixed { value: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformSettings {
    #[serde(default)]
    pub scale: ScaleMode,
    #[serde(default)]
    pub aspect: AspectMode,
}

impl TransformSettings {
    /// Resolve both knobs against the current window and pattern sizes.
    pub fn resolve(&self, window: (u32, u32), pattern: (u32, u32), mode: ColorMode) -> DrawParams {
        DrawParams {
            scale: self.scale.resolve(window, pattern),
            aspect_adjustment: self.aspect.resolve(window),
            mode,
        }
    }
}

impl ScaleMode {
    pub fn resolve(&self, window: (u32, u32), pattern: (u32, u32)) -> Vec2 {
        match *self {
            ScaleMode::Off => Vec2::ONE,
            ScaleMode::Native => native_scale(window, pattern),
            ScaleMode::Fixed { x, y } => Vec2::new(x, y),
        }
    }
}

impl AspectMode {
    pub fn resolve(&self, window: (u32, u32)) -> f32 {
        match *self {
            AspectMode::Off => 1.0,
            AspectMode::Window => {
                if window.1 == 0 {
                    1.0
                } else {
                    window.0 as f32 / window.1 as f32
                }
            }
            AspectMode::Fixed { value } => value,
        }
    }
}

// ---------------------------------------------------------------------------
// Native letterboxing
// ---------------------------------------------------------------------------

/// Scale that shows a `pattern`-sized texture one texel per window pixel.
///
/// A landscape window whose aspect ratio matches the pattern exactly is
/// filled instead. A zero-sized window yields a zero scale (empty geometry).
pub fn native_scale(window: (u32, u32), pattern: (u32, u32)) -> Vec2 {
    let (ww, wh) = window;
    let (pw, ph) = pattern;
    if ww == 0 || wh == 0 {
        return Vec2::ZERO;
    }
    // Cross-multiplied so equal ratios compare exactly.
    let same_aspect = ww as u64 * ph as u64 == wh as u64 * pw as u64;
    if same_aspect && ww > wh {
        return Vec2::ONE;
    }
    Vec2::new(pw as f32 / ww as f32, ph as f32 / wh as f32)
}
