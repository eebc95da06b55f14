//! Stimulus storage: a directory with a `stimulus.toml` header and one PNG
//! per frame, frames ordered by file name.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pattern::{Channels, Pattern};
use crate::StimError;

pub const METADATA_FILE: &str = "stimulus.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Metadata {
    fps: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checker_size: Option<u32>,
    #[serde(default)]
    shuffle: bool,
}

/// A sequence of equally sized pattern frames played at a fixed rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Stimulus {
    frames: Vec<Pattern>,
    fps: f32,
    label: Option<String>,
    pub checker_size: Option<u32>,
    pub shuffle: bool,
}

impl Stimulus {
    pub fn new(frames: Vec<Pattern>, fps: f32) -> Result<Self, StimError> {
        if !(fps > 0.0) {
            return Err(StimError::Fps(fps));
        }
        let first = frames.first().ok_or(StimError::Empty)?;
        let shape = |p: &Pattern| (p.width(), p.height(), p.channels().count());
        let expected = shape(first);
        if let Some((index, frame)) = frames.iter().enumerate().find(|(_, f)| shape(f) != expected) {
            return Err(StimError::FrameMismatch {
                index,
                expected,
                found: shape(frame),
            });
        }
        Ok(Self {
            frames,
            fps,
            label: None,
            checker_size: None,
            shuffle: false,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn frames(&self) -> &[Pattern] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// `(width, height)` shared by every frame.
    pub fn size(&self) -> (u32, u32) {
        self.frames[0].size()
    }

    pub fn channels(&self) -> Channels {
        self.frames[0].channels()
    }

    // -------------------------------------------------------------------------
    // Directory I/O
    // -------------------------------------------------------------------------

    pub fn load(dir: &Path) -> Result<Self, StimError> {
        let meta_path = dir.join(METADATA_FILE);
        let text = fs::read_to_string(&meta_path).map_err(|e| StimError::io(&meta_path, e))?;
        let meta: Metadata = toml::from_str(&text).map_err(|source| StimError::Metadata {
            path: meta_path.clone(),
            source,
        })?;

        let paths = frame_paths(dir)?;
        if paths.is_empty() {
            return Err(StimError::NoFrames(dir.to_path_buf()));
        }

        let mut channels = None;
        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let img = image::open(path).map_err(|source| StimError::Image {
                path: path.clone(),
                source,
            })?;
            // The first frame decides the layout for the whole stimulus.
            let layout = *channels.get_or_insert(if img.color().has_color() {
                Channels::Rgba
            } else {
                Channels::Gray
            });
            let (w, h) = (img.width(), img.height());
            let data = match layout {
                Channels::Gray => img.into_luma8().into_raw(),
                Channels::Rgba => img.into_rgba8().into_raw(),
            };
            frames.push(Pattern::new(w, h, layout, data)?);
        }

        log::info!("Loaded {} frame(s) from {}", frames.len(), dir.display());

        let mut stim = Self::new(frames, meta.fps)?;
        stim.label = meta.label;
        stim.checker_size = meta.checker_size;
        stim.shuffle = meta.shuffle;
        Ok(stim)
    }

    pub fn save(&self, dir: &Path) -> Result<(), StimError> {
        fs::create_dir_all(dir).map_err(|e| StimError::io(dir, e))?;

        let meta = Metadata {
            fps: self.fps,
            label: self.label.clone(),
            checker_size: self.checker_size,
            shuffle: self.shuffle,
        };
        let meta_path = dir.join(METADATA_FILE);
        fs::write(&meta_path, toml::to_string_pretty(&meta)?).map_err(|e| StimError::io(&meta_path, e))?;

        let color = match self.channels() {
            Channels::Gray => image::ColorType::L8,
            Channels::Rgba => image::ColorType::Rgba8,
        };
        for (i, frame) in self.frames.iter().enumerate() {
            let path = dir.join(format!("frame_{i:05}.png"));
            image::save_buffer(&path, frame.data(), frame.width(), frame.height(), color)
                .map_err(|source| StimError::Image { path, source })?;
        }
        Ok(())
    }
}

fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>, StimError> {
    let entries = fs::read_dir(dir).map_err(|e| StimError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StimError::io(dir, e))?.path();
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
