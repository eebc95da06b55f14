//! The six-vertex full-screen quad and the per-vertex UV lookup.
//!
//! The GPU vertex shader (`stim-gpu::renderer::QUAD_WGSL`) carries the same
//! tables; the CPU reference renderer uses the functions here.

use glam::Vec2;

/// Number of vertices submitted per draw: two triangles, no index buffer.
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Canonical quad positions in normalised device coordinates.
///
/// Triangle A is top-left, bottom-left, top-right; triangle B is top-right,
/// bottom-left, bottom-right. Both share the bottom-left → top-right diagonal.
pub const QUAD_POSITIONS: [[f32; 2]; 6] = [
    [-1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, -1.0],
];

/// UV assigned to each vertex index. Not parametrised.
pub const QUAD_UVS: [[f32; 2]; 6] = [
    [0.0, 1.0],
    [0.0, 0.0],
    [1.0, 1.0],
    [1.0, 1.0],
    [0.0, 0.0],
    [1.0, 0.0],
];

/// UV for a vertex, looked up by `index % 6`.
pub fn uv_for_index(index: u32) -> Vec2 {
    Vec2::from(QUAD_UVS[(index % QUAD_VERTEX_COUNT) as usize])
}

/// Position-derived UV (`pos * 0.5 + 0.5`).
///
/// Agrees with [`uv_for_index`] for the canonical quad only; the renderers
/// always use the index lookup.
pub fn uv_from_position(pos: Vec2) -> Vec2 {
    pos * 0.5 + 0.5
}

/// Vertex-space scale applied before rasterisation.
pub fn transform_position(pos: Vec2, scale: Vec2) -> Vec2 {
    pos * scale
}

/// The six clip-space positions after scaling, paired with their UVs.
pub fn scaled_vertices(scale: Vec2) -> [(Vec2, Vec2); 6] {
    let mut out = [(Vec2::ZERO, Vec2::ZERO); 6];
    for (i, slot) in out.iter_mut().enumerate() {
        let pos = transform_position(Vec2::from(QUAD_POSITIONS[i]), scale);
        *slot = (pos, uv_for_index(i as u32));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
        ((b - a).perp_dot(c - a) * 0.5).abs()
    }

    #[test]
    fn lookup_matches_table() {
        let expected = [
            (0.0, 1.0),
            (0.0, 0.0),
            (1.0, 1.0),
            (1.0, 1.0),
            (0.0, 0.0),
            (1.0, 0.0),
        ];
        for (i, (u, v)) in expected.iter().enumerate() {
            assert_eq!(uv_for_index(i as u32), Vec2::new(*u, *v), "vertex {i}");
        }
    }

    #[test]
    fn lookup_wraps_modulo_six() {
        for i in 0..6 {
            assert_eq!(uv_for_index(i), uv_for_index(i + 6));
            assert_eq!(uv_for_index(i), uv_for_index(i + 60));
        }
    }

    #[test]
    fn uv_triangles_tile_unit_square() {
        let uv: Vec<Vec2> = (0..6).map(uv_for_index).collect();
        let a = tri_area(uv[0], uv[1], uv[2]);
        let b = tri_area(uv[3], uv[4], uv[5]);
        // Two half-squares, and together exactly the unit square.
        assert!((a - 0.5).abs() < 1e-6);
        assert!((b - 0.5).abs() < 1e-6);

        // The shared edge is the diagonal: the remaining corners sit on
        // opposite sides of it, so the triangles cannot overlap.
        let side = |p: Vec2| (uv[2] - uv[1]).perp_dot(p - uv[1]);
        assert!(side(uv[0]) * side(uv[5]) < 0.0);
    }

    #[test]
    fn position_derivation_agrees_on_canonical_quad() {
        for i in 0..6 {
            let pos = Vec2::from(QUAD_POSITIONS[i]);
            assert_eq!(uv_from_position(pos), uv_for_index(i as u32), "vertex {i}");
        }
    }

    #[test]
    fn scale_multiplies_positions() {
        let verts = scaled_vertices(Vec2::new(0.5, 0.25));
        assert_eq!(verts[0].0, Vec2::new(-0.5, 0.25));
        assert_eq!(verts[5].0, Vec2::new(0.5, -0.25));
        // UVs are untouched by vertex scale.
        assert_eq!(verts[5].1, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn zero_scale_collapses_geometry() {
        let verts = scaled_vertices(Vec2::ZERO);
        assert!(verts.iter().all(|(p, _)| *p == Vec2::ZERO));
    }
}
