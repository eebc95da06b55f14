use stim_core::pattern::{Channels, Pattern};
use wgpu::{Device, Queue};

/// A pattern frame resident on the GPU. Owned by the caller: uploaded once
/// per stimulus, sampled every frame, dropped when playback ends.
pub struct PatternTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    channels: Channels,
}

/// `R8Unorm` for single-channel noise, `Rgba8Unorm` otherwise. Both are
/// filterable and sample as normalised floats.
pub fn format_for(channels: Channels) -> wgpu::TextureFormat {
    match channels {
        Channels::Gray => wgpu::TextureFormat::R8Unorm,
        Channels::Rgba => wgpu::TextureFormat::Rgba8Unorm,
    }
}

impl PatternTexture {
    pub fn upload(device: &Device, queue: &Queue, pattern: &Pattern, label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: pattern.width(),
            height: pattern.height(),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format_for(pattern.channels()),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // Row 0 of the pattern becomes texture row 0 (v = 0).
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pattern.data(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(pattern.bytes_per_row()),
                rows_per_image: Some(pattern.height()),
            },
            size,
        );

        let view = texture.create_view(&Default::default());
        Self {
            texture,
            view,
            channels: pattern.channels(),
        }
    }

    /// Upload every frame of a stimulus, in order.
    pub fn upload_all(device: &Device, queue: &Queue, frames: &[Pattern]) -> Vec<Self> {
        frames
            .iter()
            .enumerate()
            .map(|(i, frame)| Self::upload(device, queue, frame, &format!("pattern_{i}")))
            .collect()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}
