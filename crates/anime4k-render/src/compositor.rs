//! Final pass drawing the chain output onto the presentation surface
//!
//! A full-screen quad is rasterized and the fragment stage samples the bound
//! texture with a bilinear, clamp-to-edge sampler, stretching it to the
//! surface size.

use crate::error::{EngineError, Result};
use crate::gpu::Compositor;
use crate::wgpu_context::WgpuContext;
use wgpu::util::DeviceExt;

/// Background color for anything the quad does not cover
const BACKGROUND_COLOR: wgpu::Color = wgpu::Color::BLACK;

/// Vertex with a clip-space position and the matching texture coordinates
#[derive(Debug, Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
#[repr(C)]
struct Vertex {
    position: [f32; 2],
    texture_coords: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: Self::ATTRIBUTES,
        array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
    };
}

/// Two triangles covering clip space; texture v grows downwards
const VERTICES: &[Vertex] = &[
    Vertex {
        position: [1.0, 1.0],
        texture_coords: [1.0, 0.0],
    },
    Vertex {
        position: [1.0, -1.0],
        texture_coords: [1.0, 1.0],
    },
    Vertex {
        position: [-1.0, -1.0],
        texture_coords: [0.0, 1.0],
    },
    Vertex {
        position: [1.0, 1.0],
        texture_coords: [1.0, 0.0],
    },
    Vertex {
        position: [-1.0, -1.0],
        texture_coords: [0.0, 1.0],
    },
    Vertex {
        position: [-1.0, 1.0],
        texture_coords: [0.0, 0.0],
    },
];

/// Binding of the sampler in the composite shader
const SAMPLER_BINDING: u32 = 1;
/// Binding of the sampled texture in the composite shader
const TEXTURE_BINDING: u32 = 2;

/// Render pipeline that stretches a texture over the whole surface
#[derive(Debug)]
pub struct SurfaceCompositor {
    device: wgpu::Device,
    target_format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

impl SurfaceCompositor {
    /// Compiles the composite pipeline for `target_format`
    ///
    /// Validation errors raised while compiling are collected through an error
    /// scope and returned instead of reaching the device's uncaptured handler.
    pub async fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                },
                wgpu::BindGroupLayoutEntry {
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                    binding: TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader_module = device.create_shader_module(wgpu::include_wgsl!("shaders/composite.wgsl"));

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite pipeline"),
            layout: Some(&pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &shader_module,
                buffers: &[Vertex::LAYOUT],
                compilation_options: Default::default(),
                entry_point: Some("vs_main"),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
                entry_point: Some("fs_main"),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            multisample: wgpu::MultisampleState::default(),
            depth_stencil: None,
            multiview: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Composite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Composite vertex buffer"),
            usage: wgpu::BufferUsages::VERTEX,
            contents: bytemuck::cast_slice(VERTICES),
        });

        if let Some(err) = device.pop_error_scope().await {
            return Err(EngineError::CompositorCompilation(err.to_string()));
        }

        tracing::debug!(format = ?target_format, "compositor pipeline compiled");

        Ok(Self {
            device: device.clone(),
            target_format,
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
            bind_group: None,
        })
    }
}

impl Compositor<WgpuContext> for SurfaceCompositor {
    fn bind(&mut self, _gpu: &WgpuContext, texture: &wgpu::Texture) {
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
            ],
        }));
    }

    fn draw(&self, encoder: &mut wgpu::CommandEncoder, frame: &wgpu::SurfaceTexture) -> Result<()> {
        let bind_group = self.bind_group.as_ref().ok_or(EngineError::CompositorUnbound)?;

        // Render through a linear view so the surface never re-encodes to sRGB
        let frame_view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.target_format),
            ..Default::default()
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(BACKGROUND_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..VERTICES.len() as u32, 0..1);

        Ok(())
    }
}
