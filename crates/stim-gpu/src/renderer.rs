use stim_core::quad::{QUAD_POSITIONS, QUAD_VERTEX_COUNT};
use stim_core::{ColorMode, DrawParams, EdgeMode, FilterMode};
use wgpu::util::DeviceExt;
use wgpu::{BindGroupLayout, Buffer, Device, Queue, RenderPipeline, Sampler};

use crate::context::Uniforms;
use crate::texture::PatternTexture;

/// Pattern quad shader.
///
/// The vertex stage takes one position per vertex, scales it, and assigns
/// the UV by vertex index. The fragment stage flips v so pattern row 0 lands
/// at the top of the screen, stretches u by the aspect adjustment, and either
/// replicates red (`fs_gray`) or passes RGBA through (`fs_color`).
pub const QUAD_WGSL: &str = r#"
struct Uniforms {
    scale: vec2<f32>,
    aspect_adjustment: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var t_pattern: texture_2d<f32>;
@group(0) @binding(2) var s_pattern: sampler;

struct VertexOut {
    @builtin(position) pos: vec4<f32>,
    @location(0)       uv:  vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32, @location(0) in_pos: vec2<f32>) -> VertexOut {
    // Two triangles sharing the bottom-left / top-right diagonal
    var uvs = array<vec2<f32>, 6>(
        vec2(0.0, 1.0), vec2(0.0, 0.0), vec2(1.0, 1.0),
        vec2(1.0, 1.0), vec2(0.0, 0.0), vec2(1.0, 0.0),
    );
    var out: VertexOut;
    out.pos = vec4(in_pos * uniforms.scale, 0.0, 1.0);
    out.uv  = uvs[vi % 6u];
    return out;
}

fn pattern_coord(uv: vec2<f32>) -> vec2<f32> {
    return vec2(uv.x * uniforms.aspect_adjustment, 1.0 - uv.y);
}

@fragment
fn fs_gray(in: VertexOut) -> @location(0) vec4<f32> {
    let r = textureSample(t_pattern, s_pattern, pattern_coord(in.uv)).r;
    return vec4(r, r, r, 1.0);
}

@fragment
fn fs_color(in: VertexOut) -> @location(0) vec4<f32> {
    return textureSample(t_pattern, s_pattern, pattern_coord(in.uv));
}
"#;

/// One vertex of the quad: a position and nothing else.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Texture edge and filter policy, fixed for the lifetime of a renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sampling {
    pub edge: EdgeMode,
    pub filter: FilterMode,
}

impl Sampling {
    fn address_mode(self) -> wgpu::AddressMode {
        match self.edge {
            EdgeMode::Clamp => wgpu::AddressMode::ClampToEdge,
            EdgeMode::Repeat => wgpu::AddressMode::Repeat,
        }
    }

    fn filter_mode(self) -> wgpu::FilterMode {
        match self.filter {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Draws a pattern texture on the six-vertex quad.
///
/// Holds one pipeline per colour mode plus the resources every draw shares:
/// the uniform buffer, the vertex buffer and the sampler.
pub struct QuadRenderer {
    grayscale: RenderPipeline,
    color: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    uniform_buf: Buffer,
    vertex_buf: Buffer,
    sampler: Sampler,
    sampling: Sampling,
}

impl QuadRenderer {
    pub fn new(device: &Device, target_format: wgpu::TextureFormat, sampling: Sampling) -> Self {
        // --- bind group layout -------------------------------------------------
        // binding 0 : Uniforms uniform buffer
        // binding 1 : pattern texture
        // binding 2 : pattern sampler
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // --- buffers -----------------------------------------------------------
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad_uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertices = QUAD_POSITIONS.map(|position| QuadVertex { position });
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pattern_sampler"),
            mag_filter: sampling.filter_mode(),
            min_filter: sampling.filter_mode(),
            address_mode_u: sampling.address_mode(),
            address_mode_v: sampling.address_mode(),
            ..Default::default()
        });

        // --- pipelines --------------------------------------------------------
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad"),
            source: wgpu::ShaderSource::Wgsl(QUAD_WGSL.into()),
        });

        let make = |label: &str, fragment_entry: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: fragment_entry,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    // Negative scale flips winding; the quad must still draw.
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            grayscale: make("quad_grayscale", "fs_gray"),
            color: make("quad_color", "fs_color"),
            bind_group_layout,
            uniform_buf,
            vertex_buf,
            sampler,
            sampling,
        }
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Bind group for one pattern texture. Create once per texture and reuse
    /// it every frame the texture is shown.
    pub fn bind(&self, device: &Device, texture: &PatternTexture) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn pipeline_for(&self, mode: ColorMode) -> &RenderPipeline {
        match mode {
            ColorMode::Grayscale => &self.grayscale,
            ColorMode::Color => &self.color,
        }
    }

    /// Upload `params` and record the quad draw into `encoder`, clearing
    /// `target` to black first.
    ///
    /// The uniform buffer is shared, so record at most one draw per submit.
    pub fn draw(
        &self,
        queue: &Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
        params: &DrawParams,
    ) {
        queue.write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&Uniforms::from(params)));

        let mut rpass = begin_pass(encoder, target, wgpu::Color::BLACK);
        rpass.set_pipeline(self.pipeline_for(params.mode));
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buf.slice(..));
        rpass.draw(0..QUAD_VERTEX_COUNT, 0..1); // two triangles, no index buffer
    }

    /// Fill `target` with a solid colour (blank and white screens).
    pub fn clear(encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView, color: wgpu::Color) {
        begin_pass(encoder, target, color);
    }
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &wgpu::TextureView,
    clear: wgpu::Color,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("quad_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}
