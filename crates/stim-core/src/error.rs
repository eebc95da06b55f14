use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StimError {
    #[error("pattern data has {actual} bytes, expected {expected} ({width}x{height}, {channels} channel(s))")]
    PatternSize {
        width: u32,
        height: u32,
        channels: u32,
        expected: usize,
        actual: usize,
    },
    #[error("pattern must be at least 1x1, got {width}x{height}")]
    EmptyPattern { width: u32, height: u32 },
    #[error("fps must be positive, got {0}")]
    Fps(f32),
    #[error("stimulus has no frames")]
    Empty,
    #[error("frame {index} is {found:?} but the first frame is {expected:?}")]
    FrameMismatch {
        index: usize,
        expected: (u32, u32, u32),
        found: (u32, u32, u32),
    },
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no frame images found in {}", .0.display())]
    NoFrames(PathBuf),
    #[error("failed to process image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid stimulus metadata in {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode stimulus metadata: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid playback settings: {0}")]
    Playback(String),
    #[error("invalid noise parameters: {0}")]
    Noise(String),
}

impl StimError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
