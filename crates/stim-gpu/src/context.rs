use stim_core::DrawParams;
use wgpu::{Adapter, Device, Instance, Queue};

use crate::error::GpuError;

pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    /// Create a headless GPU context (no surface). Used for offscreen
    /// snapshots and testing. Window rendering goes through [`Self::for_surface`].
    pub async fn new_headless() -> Result<Self, GpuError> {
        Self::request(Instance::default(), None).await
    }

    /// Create a context whose adapter can present to `surface`.
    pub async fn for_surface(instance: Instance, surface: &wgpu::Surface<'_>) -> Result<Self, GpuError> {
        Self::request(instance, Some(surface)).await
    }

    async fn request(instance: Instance, surface: Option<&wgpu::Surface<'_>>) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        log::info!("GPU adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("stim-gpu device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// Per-draw data uploaded to the GPU as a single uniform buffer.
/// Must match the `Uniforms` struct in `QUAD_WGSL`.
/// `repr(C)` + `bytemuck` ensures safe casting to `&[u8]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub scale: [f32; 2],
    pub aspect_adjustment: f32,
    pub _pad: f32, // keep 16-byte alignment
}

impl From<&DrawParams> for Uniforms {
    fn from(params: &DrawParams) -> Self {
        Self {
            scale: params.scale.to_array(),
            aspect_adjustment: params.aspect_adjustment,
            _pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn uniforms_are_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 16);
    }

    #[test]
    fn uniforms_mirror_draw_params() {
        let params = DrawParams {
            scale: Vec2::new(0.5, 2.0),
            aspect_adjustment: 1.25,
            ..DrawParams::default()
        };
        let u = Uniforms::from(&params);
        assert_eq!(u.scale, [0.5, 2.0]);
        assert_eq!(u.aspect_adjustment, 1.25);
        assert_eq!(bytemuck::bytes_of(&u).len(), 16);
    }
}
