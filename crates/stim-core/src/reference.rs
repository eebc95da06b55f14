//! CPU reference renderer.
//!
//! Rasterises the same six vertices the GPU draws, with the same UV table,
//! transforms and sampling rules, so every property of the shader path can
//! be checked without an adapter. Nearest filtering only.

use glam::{DVec2, Vec2};

use crate::pattern::Pattern;
use crate::quad::scaled_vertices;
use crate::{ColorMode, DrawParams, EdgeMode};

/// Colour written where the quad does not cover the target.
pub const CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

// ---------------------------------------------------------------------------
// Frame: a rendered colour buffer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at `(x, y)`, origin top-left.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Pixel containing screen UV `(u, v)`: u grows rightwards, v upwards.
    /// An empty frame reads as [`CLEAR`].
    pub fn at_uv(&self, u: f32, v: f32) -> [f32; 4] {
        if self.pixels.is_empty() {
            return CLEAR;
        }
        let x = ((u * self.width as f32).floor().max(0.0) as u32).min(self.width.saturating_sub(1));
        let y = (((1.0 - v) * self.height as f32).floor().max(0.0) as u32).min(self.height.saturating_sub(1));
        self.pixel(x, y)
    }

    /// 8-bit RGBA, row-major, top row first.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Shading
// ---------------------------------------------------------------------------

/// Quad UV (v up) → pattern texture coordinate (origin top-left).
pub fn texture_coord(uv: Vec2, aspect_adjustment: f32) -> Vec2 {
    Vec2::new(uv.x * aspect_adjustment, 1.0 - uv.y)
}

/// Fragment output for a sampled texel.
pub fn shade(texel: [f32; 4], mode: ColorMode) -> [f32; 4] {
    match mode {
        ColorMode::Grayscale => [texel[0], texel[0], texel[0], 1.0],
        ColorMode::Color => texel,
    }
}

/// Untransformed 1:1 lookup of `pattern` at screen UV `uv`.
pub fn sample_direct(pattern: &Pattern, uv: Vec2, edge: EdgeMode, mode: ColorMode) -> [f32; 4] {
    shade(pattern.sample(texture_coord(uv, 1.0), edge), mode)
}

// ---------------------------------------------------------------------------
// Rasterisation
// ---------------------------------------------------------------------------

struct ScreenTri {
    pos: [DVec2; 3],
    uv: [Vec2; 3],
    area: f64,
}

fn edge_fn(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Tie rule for pixel centres lying exactly on an edge. Two triangles with
/// the same winding walk a shared edge in opposite directions, so exactly one
/// of them owns it.
fn owns_edge(a: DVec2, b: DVec2) -> bool {
    let d = b - a;
    d.y > 0.0 || (d.y == 0.0 && d.x < 0.0)
}

impl ScreenTri {
    fn new(mut pos: [DVec2; 3], mut uv: [Vec2; 3]) -> Option<Self> {
        let mut area = edge_fn(pos[0], pos[1], pos[2]);
        if area == 0.0 {
            return None;
        }
        if area < 0.0 {
            pos.swap(1, 2);
            uv.swap(1, 2);
            area = -area;
        }
        Some(Self { pos, uv, area })
    }

    /// Barycentric weights if `p` is covered.
    fn cover(&self, p: DVec2) -> Option<[f64; 3]> {
        let [a, b, c] = self.pos;
        let edges = [(b, c), (c, a), (a, b)];
        let mut w = [0.0; 3];
        for (i, (from, to)) in edges.into_iter().enumerate() {
            let e = edge_fn(from, to, p);
            if e < 0.0 || (e == 0.0 && !owns_edge(from, to)) {
                return None;
            }
            w[i] = e;
        }
        Some(w)
    }

    fn interpolate_uv(&self, w: [f64; 3]) -> Vec2 {
        let mut uv = DVec2::ZERO;
        for i in 0..3 {
            uv += self.uv[i].as_dvec2() * w[i];
        }
        (uv / self.area).as_vec2()
    }
}

fn screen_triangles(scale: Vec2, width: u32, height: u32) -> Vec<ScreenTri> {
    let (w, h) = (width as f64, height as f64);
    let to_screen = |ndc: Vec2| DVec2::new((ndc.x as f64 + 1.0) * 0.5 * w, (1.0 - ndc.y as f64) * 0.5 * h);

    scaled_vertices(scale)
        .chunks_exact(3)
        .filter_map(|tri| {
            let pos = [to_screen(tri[0].0), to_screen(tri[1].0), to_screen(tri[2].0)];
            let uv = [tri[0].1, tri[1].1, tri[2].1];
            ScreenTri::new(pos, uv)
        })
        .collect()
}

fn pixel_centre(x: u32, y: u32) -> DVec2 {
    DVec2::new(x as f64 + 0.5, y as f64 + 0.5)
}

/// Draw one quad into a `width × height` target cleared to [`CLEAR`].
pub fn render(pattern: &Pattern, params: &DrawParams, edge: EdgeMode, width: u32, height: u32) -> Frame {
    let tris = screen_triangles(params.scale, width, height);
    let mut pixels = vec![CLEAR; width as usize * height as usize];

    for y in 0..height {
        for x in 0..width {
            let p = pixel_centre(x, y);
            let hit = tris.iter().find_map(|t| t.cover(p).map(|w| t.interpolate_uv(w)));
            if let Some(uv) = hit {
                let texel = pattern.sample(texture_coord(uv, params.aspect_adjustment), edge);
                pixels[(y * width + x) as usize] = shade(texel, params.mode);
            }
        }
    }

    Frame { width, height, pixels }
}

/// How many of the quad's triangles cover each pixel centre, row-major.
pub fn coverage(scale: Vec2, width: u32, height: u32) -> Vec<u8> {
    let tris = screen_triangles(scale, width, height);
    let mut counts = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let p = pixel_centre(x, y);
            counts.push(tris.iter().filter(|t| t.cover(p).is_some()).count() as u8);
        }
    }
    counts
}
