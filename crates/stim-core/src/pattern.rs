use glam::Vec2;

use crate::{EdgeMode, StimError};

/// Channel layout of a pattern frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Gray,
    Rgba,
}

impl Channels {
    pub fn count(self) -> u32 {
        match self {
            Channels::Gray => 1,
            Channels::Rgba => 4,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            1 => Some(Channels::Gray),
            4 => Some(Channels::Rgba),
            _ => None,
        }
    }
}

/// One stimulus frame in CPU memory, rows stored top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<u8>,
}

impl Pattern {
    pub fn new(width: u32, height: u32, channels: Channels, data: Vec<u8>) -> Result<Self, StimError> {
        if width == 0 || height == 0 {
            return Err(StimError::EmptyPattern { width, height });
        }
        let expected = width as usize * height as usize * channels.count() as usize;
        if data.len() != expected {
            return Err(StimError::PatternSize {
                width,
                height,
                channels: channels.count(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Caller guarantees `data.len() == width * height * channels`.
    pub(crate) fn from_parts(width: u32, height: u32, channels: Channels, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height * channels.count()) as usize);
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Result<Self, StimError> {
        Self::new(width, height, Channels::Gray, data)
    }

    pub fn rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, StimError> {
        Self::new(width, height, Channels::Rgba, data)
    }

    /// Binary checkerboard with `cols × rows` one-texel cells. The top-left
    /// texel is `on`. Zero counts are raised to one cell.
    pub fn checker(cols: u32, rows: u32, channels: Channels, on: [u8; 4], off: [u8; 4]) -> Self {
        let (cols, rows) = (cols.max(1), rows.max(1));
        let n = channels.count() as usize;
        let mut data = Vec::with_capacity(cols as usize * rows as usize * n);
        for y in 0..rows {
            for x in 0..cols {
                let texel = if (x + y) % 2 == 0 { on } else { off };
                data.extend_from_slice(&texel[..n]);
            }
        }
        Self {
            width: cols,
            height: rows,
            channels,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.channels.count()
    }

    /// Normalised texel as the GPU would return it: single-channel textures
    /// read back as `(r, 0, 0, 1)`.
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let n = self.channels.count() as usize;
        let i = (y as usize * self.width as usize + x as usize) * n;
        let norm = |b: u8| b as f32 / 255.0;
        match self.channels {
            Channels::Gray => [norm(self.data[i]), 0.0, 0.0, 1.0],
            Channels::Rgba => [
                norm(self.data[i]),
                norm(self.data[i + 1]),
                norm(self.data[i + 2]),
                norm(self.data[i + 3]),
            ],
        }
    }

    /// Nearest-texel lookup at texture coordinate `coord` (origin top-left,
    /// `[0,1]²` spans the whole pattern).
    pub fn sample(&self, coord: Vec2, edge: EdgeMode) -> [f32; 4] {
        let x = texel_index(coord.x, self.width, edge);
        let y = texel_index(coord.y, self.height, edge);
        self.texel(x, y)
    }
}

fn texel_index(t: f32, size: u32, edge: EdgeMode) -> u32 {
    let t = match edge {
        EdgeMode::Clamp => t.clamp(0.0, 1.0),
        EdgeMode::Repeat => t - t.floor(),
    };
    let last = size.saturating_sub(1);
    ((t * size as f32).floor().max(0.0) as u32).min(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    #[test]
    fn new_rejects_wrong_length() {
        let err = Pattern::gray(2, 2, vec![0; 3]).unwrap_err();
        assert!(matches!(err, StimError::PatternSize { expected: 4, actual: 3, .. }));
        assert!(Pattern::rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn new_rejects_empty_dimensions() {
        assert!(matches!(
            Pattern::gray(0, 0, vec![]),
            Err(StimError::EmptyPattern { width: 0, height: 0 })
        ));
        assert!(matches!(Pattern::rgba(4, 0, vec![]), Err(StimError::EmptyPattern { .. })));
        assert_eq!(Pattern::checker(0, 0, Channels::Gray, [255; 4], [0; 4]).size(), (1, 1));
    }

    #[test]
    fn checker_alternates() {
        let p = Pattern::checker(2, 2, Channels::Gray, WHITE, BLACK);
        assert_eq!(p.data(), &[255, 0, 0, 255]);
    }

    #[test]
    fn gray_texel_reads_red_only() {
        let p = Pattern::gray(1, 1, vec![255]).unwrap();
        assert_eq!(p.texel(0, 0), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn sample_picks_nearest_texel() {
        let p = Pattern::checker(2, 2, Channels::Gray, WHITE, BLACK);
        assert_eq!(p.sample(Vec2::new(0.25, 0.25), EdgeMode::Clamp)[0], 1.0);
        assert_eq!(p.sample(Vec2::new(0.75, 0.25), EdgeMode::Clamp)[0], 0.0);
        assert_eq!(p.sample(Vec2::new(0.25, 0.75), EdgeMode::Clamp)[0], 0.0);
        assert_eq!(p.sample(Vec2::new(0.75, 0.75), EdgeMode::Clamp)[0], 1.0);
    }

    #[test]
    fn clamp_holds_edge_texel() {
        let p = Pattern::checker(2, 1, Channels::Gray, WHITE, BLACK);
        assert_eq!(p.sample(Vec2::new(1.6, 0.5), EdgeMode::Clamp)[0], 0.0);
        assert_eq!(p.sample(Vec2::new(-0.4, 0.5), EdgeMode::Clamp)[0], 1.0);
    }

    #[test]
    fn repeat_wraps_around() {
        let p = Pattern::checker(2, 1, Channels::Gray, WHITE, BLACK);
        // 1.25 wraps to 0.25 → first texel
        assert_eq!(p.sample(Vec2::new(1.25, 0.5), EdgeMode::Repeat)[0], 1.0);
        assert_eq!(p.sample(Vec2::new(-0.25, 0.5), EdgeMode::Repeat)[0], 0.0);
    }
}
