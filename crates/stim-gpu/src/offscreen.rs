use stim_core::pattern::Pattern;
use stim_core::DrawParams;

use crate::context::GpuContext;
use crate::error::GpuError;
use crate::renderer::{QuadRenderer, Sampling};
use crate::texture::PatternTexture;

/// Format of offscreen targets. Linear, so readback bytes equal the shader
/// output without an sRGB encode.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A render target that can be copied back to the CPU.
pub struct OffscreenTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row: u32,
}

/// Row pitch for texture-to-buffer copies, rounded up to wgpu's alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());

        let padded_row = padded_bytes_per_row(width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen_readback"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            texture,
            view,
            readback,
            width,
            height,
            padded_row,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Record the copy from the target texture into the readback buffer.
    pub fn copy_out(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Map the readback buffer and return tightly packed RGBA8 rows, top row
    /// first. Call after the encoder holding [`Self::copy_out`] was submitted.
    pub fn read(&self, device: &wgpu::Device) -> Result<Vec<u8>, GpuError> {
        let slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| GpuError::ReadbackLost)??;

        let row = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row * self.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for chunk in mapped.chunks(self.padded_row as usize) {
                pixels.extend_from_slice(&chunk[..row]);
            }
        }
        self.readback.unmap();
        Ok(pixels)
    }
}

/// Render `pattern` once into a `width`×`height` offscreen target and read
/// the result back as RGBA8.
pub fn render_offscreen(
    ctx: &GpuContext,
    pattern: &Pattern,
    params: &DrawParams,
    sampling: Sampling,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, GpuError> {
    let renderer = QuadRenderer::new(&ctx.device, OFFSCREEN_FORMAT, sampling);
    let texture = PatternTexture::upload(&ctx.device, &ctx.queue, pattern, "snapshot_pattern");
    let bind_group = renderer.bind(&ctx.device, &texture);
    let target = OffscreenTarget::new(&ctx.device, width, height);

    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("offscreen_encoder"),
    });
    let params = params.with_mode(params.mode.effective_for(pattern.channels()));
    renderer.draw(&ctx.queue, &mut encoder, target.view(), &bind_group, &params);
    target.copy_out(&mut encoder);
    ctx.queue.submit(Some(encoder.finish()));

    log::debug!("offscreen render {width}x{height} submitted");
    target.read(&ctx.device)
}
