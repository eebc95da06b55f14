pub mod context;
pub mod error;
pub mod offscreen;
pub mod renderer;
pub mod texture;

pub use context::{GpuContext, Uniforms};
pub use error::GpuError;
pub use offscreen::{render_offscreen, OffscreenTarget};
pub use renderer::{QuadRenderer, Sampling};
pub use texture::PatternTexture;
