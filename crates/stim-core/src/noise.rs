use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::pattern::{Channels, Pattern};
use crate::stimulus::Stimulus;
use crate::StimError;

/// Parameters for a generated binary checkerboard noise stimulus.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseSpec {
    pub frames: u32,
    /// Cell edge length in pixels.
    pub checker_size: u32,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    /// Roll every frame by a random sub-cell offset.
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl NoiseSpec {
    fn validate(&self) -> Result<(), StimError> {
        if self.frames == 0 {
            return Err(StimError::Noise("frame count must be at least 1".into()));
        }
        if self.checker_size == 0 {
            return Err(StimError::Noise("checker size must be at least 1 pixel".into()));
        }
        if self.width < self.checker_size || self.height < self.checker_size {
            return Err(StimError::Noise(format!(
                "{}x{} cannot hold a single {}px checker",
                self.width, self.height, self.checker_size
            )));
        }
        if !(self.fps > 0.0) {
            return Err(StimError::Noise(format!("fps must be positive, got {}", self.fps)));
        }
        Ok(())
    }

    /// Generate every frame of the stimulus.
    pub fn generate(&self) -> Result<Stimulus, StimError> {
        self.validate()?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let frames = (0..self.frames)
            .map(|_| {
                let frame = checkerboard(&mut rng, self.checker_size, self.width, self.height);
                if self.shuffle {
                    shuffle(&mut rng, frame, self.checker_size)
                } else {
                    frame
                }
            })
            .collect();

        let label = format!("checker_{}px_{}x{}", self.checker_size, self.width, self.height);
        let mut stim = Stimulus::new(frames, self.fps)?.with_label(label);
        stim.checker_size = Some(self.checker_size);
        stim.shuffle = self.shuffle;
        Ok(stim)
    }
}

/// One frame of random black/white cells. The image is cropped to a whole
/// number of cells: `floor(width / cs) * cs` by `floor(height / cs) * cs`.
pub fn checkerboard<R: Rng>(rng: &mut R, checker_size: u32, width: u32, height: u32) -> Pattern {
    let cols = width / checker_size;
    let rows = height / checker_size;
    let cells: Vec<u8> = (0..cols * rows).map(|_| if rng.gen::<bool>() { 255 } else { 0 }).collect();

    let (w, h) = (cols * checker_size, rows * checker_size);
    let mut data = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        let row = &cells[((y / checker_size) * cols) as usize..][..cols as usize];
        for x in 0..w {
            data.push(row[(x / checker_size) as usize]);
        }
    }
    Pattern::from_parts(w, h, Channels::Gray, data)
}

/// Offsets a shuffled frame may be rolled by: `0, cs/4, 2·cs/4, …` up to `cs/2`.
pub fn shift_choices(checker_size: u32) -> Vec<u32> {
    let step = checker_size / 4;
    if step == 0 {
        return vec![0];
    }
    (0..=checker_size / 2).step_by(step as usize).collect()
}

/// Roll `frame` (wrapping) by a random allowed offset on each axis.
pub fn shuffle<R: Rng>(rng: &mut R, frame: Pattern, checker_size: u32) -> Pattern {
    let choices = shift_choices(checker_size);
    let dx = *choices.choose(rng).unwrap_or(&0);
    let dy = *choices.choose(rng).unwrap_or(&0);
    roll(frame, dx, dy)
}

/// Move every texel `dx` right and `dy` down, wrapping at the edges.
pub fn roll(frame: Pattern, dx: u32, dy: u32) -> Pattern {
    let (w, h) = frame.size();
    let n = frame.channels().count() as usize;
    let channels = frame.channels();
    let src = frame.into_data();
    let mut out = vec![0u8; src.len()];
    for y in 0..h {
        let ty = (y + dy) % h;
        for x in 0..w {
            let tx = (x + dx) % w;
            let s = (y as usize * w as usize + x as usize) * n;
            let d = (ty as usize * w as usize + tx as usize) * n;
            out[d..d + n].copy_from_slice(&src[s..s + n]);
        }
    }
    Pattern::from_parts(w, h, channels, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> NoiseSpec {
        NoiseSpec {
            frames: 3,
            checker_size: 4,
            width: 18,
            height: 10,
            fps: 30.0,
            shuffle: false,
            seed: Some(7),
        }
    }

    #[test]
    fn frames_are_cropped_to_whole_cells() {
        let stim = spec().generate().unwrap();
        assert_eq!(stim.frames().len(), 3);
        assert_eq!(stim.size(), (16, 8));
    }

    #[test]
    fn cells_are_uniform_and_binary() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = checkerboard(&mut rng, 4, 16, 8);
        let data = p.data();
        for y in 0..8u32 {
            for x in 0..16u32 {
                let v = data[(y * 16 + x) as usize];
                assert!(v == 0 || v == 255);
                let corner = data[((y / 4 * 4) * 16 + x / 4 * 4) as usize];
                assert_eq!(v, corner, "({x},{y}) differs from its cell");
            }
        }
    }

    #[test]
    fn seed_makes_generation_reproducible() {
        assert_eq!(spec().generate().unwrap(), spec().generate().unwrap());
        let other = NoiseSpec {
            seed: Some(8),
            ..spec()
        };
        assert_ne!(spec().generate().unwrap(), other.generate().unwrap());
    }

    #[test]
    fn shift_choices_follow_quarter_cells() {
        assert_eq!(shift_choices(40), vec![0, 10, 20]);
        assert_eq!(shift_choices(8), vec![0, 2, 4]);
        assert_eq!(shift_choices(3), vec![0]);
    }

    #[test]
    fn roll_wraps() {
        let p = Pattern::gray(3, 1, vec![1, 2, 3]).unwrap();
        assert_eq!(roll(p, 1, 0).data(), &[3, 1, 2]);

        let p = Pattern::gray(1, 2, vec![1, 2]).unwrap();
        assert_eq!(roll(p, 0, 1).data(), &[2, 1]);
    }

    #[test]
    fn shuffle_keeps_value_histogram() {
        let mut rng = StdRng::seed_from_u64(3);
        let p = checkerboard(&mut rng, 8, 32, 32);
        let white = p.data().iter().filter(|&&v| v == 255).count();
        let shuffled = shuffle(&mut rng, p, 8);
        assert_eq!(shuffled.data().iter().filter(|&&v| v == 255).count(), white);
    }

    #[test]
    fn rejects_bad_specs() {
        for bad in [
            NoiseSpec { frames: 0, ..spec() },
            NoiseSpec { checker_size: 0, ..spec() },
            NoiseSpec { width: 2, ..spec() },
            NoiseSpec { fps: 0.0, ..spec() },
        ] {
            assert!(matches!(bad.generate(), Err(StimError::Noise(_))), "{bad:?}");
        }
    }
}
