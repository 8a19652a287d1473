//! Single compute-pass stages and the built-in kernels
//!
//! A [`KernelStage`] binds one WGSL compute shader to its input texture, a
//! clamp-to-edge sampler and a write-only storage texture it owns, and
//! dispatches one invocation per output pixel.

use crate::dimensions::Dimensions;
use crate::error::{EngineError, Result};
use crate::stage::{DOWNSCALE_STAGE, EffectStage, StageDescriptor, StageRegistry};
use crate::wgpu_context::{FRAME_TEXTURE_FORMAT, WgpuContext};

/// Compute shader workgroup size in X dimension
const COMPUTE_WORKGROUP_SIZE_X: u32 = 8;
/// Compute shader workgroup size in Y dimension
const COMPUTE_WORKGROUP_SIZE_Y: u32 = 8;

const INPUT_TEXTURE_BINDING: u32 = 0;
const SAMPLER_BINDING: u32 = 1;
const OUTPUT_TEXTURE_BINDING: u32 = 2;

/// How a kernel's output size follows from its descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    /// Same as the native input size
    Native,
    /// Native input size multiplied by an integer factor
    Scaled(u32),
    /// Exactly the descriptor's target size
    Target,
}

impl OutputSize {
    /// Resolves the output size for a stage built from `native` and `target`
    pub fn resolve(&self, native: Dimensions, target: Dimensions) -> Dimensions {
        match *self {
            OutputSize::Native => native,
            OutputSize::Scaled(factor) => Dimensions::new(native.width.saturating_mul(factor), native.height.saturating_mul(factor)),
            OutputSize::Target => target,
        }
    }
}

/// Static description of a compute kernel
///
/// The shader must declare its input texture at binding 0, a filtering
/// sampler at binding 1 and an `rgba16float` write-only storage texture at
/// binding 2, with an 8x8 `main` entry point.
#[derive(Debug, Clone, Copy)]
pub struct KernelSpec {
    /// Label used for the GPU objects of the stage
    pub label: &'static str,
    /// WGSL source
    pub source: &'static str,
    pub output_size: OutputSize,
}

/// Kernels shipped with the crate
pub mod kernels {
    use super::{KernelSpec, OutputSize};

    const RESAMPLE_SOURCE: &str = include_str!("shaders/resample.wgsl");

    /// Bilinear resample to the descriptor's target size
    pub const DOWNSCALE: KernelSpec = KernelSpec {
        label: "Downscale",
        source: RESAMPLE_SOURCE,
        output_size: OutputSize::Target,
    };

    /// Bilinear x2 upscale
    pub const BILINEAR_X2: KernelSpec = KernelSpec {
        label: "UpscaleBilinearx2",
        source: RESAMPLE_SOURCE,
        output_size: OutputSize::Scaled(2),
    };

    /// Plain copy at the native size
    pub const COPY: KernelSpec = KernelSpec {
        label: "Copy",
        source: RESAMPLE_SOURCE,
        output_size: OutputSize::Native,
    };
}

/// A stage running one compute pass per frame
#[derive(Debug)]
pub struct KernelStage {
    label: &'static str,
    compute_dimensions: Dimensions,
    compute_pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    output_texture: wgpu::Texture,
}

impl KernelStage {
    /// Compiles `spec` and allocates its output texture
    ///
    /// # Errors
    /// Returns a stage construction error if the resolved output size is empty.
    pub fn new(spec: &KernelSpec, desc: &StageDescriptor<'_, WgpuContext>) -> Result<Self> {
        let output_dimensions = spec.output_size.resolve(desc.native_dimensions, desc.target_dimensions);
        if output_dimensions.is_empty() {
            return Err(EngineError::stage_construction(spec.label, format!("output size {output_dimensions} is empty")));
        }

        let gpu = desc.gpu;
        let device = gpu.device();
        let output_texture = gpu.create_stage_texture(spec.label, output_dimensions);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(spec.label),
            source: wgpu::ShaderSource::Wgsl(spec.source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(spec.label),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: INPUT_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: OUTPUT_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: FRAME_TEXTURE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(spec.label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(spec.label),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(spec.label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let input_view = desc.input_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(spec.label),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: INPUT_TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&input_view),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: OUTPUT_TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
            ],
        });

        Ok(Self {
            label: spec.label,
            compute_dimensions: output_dimensions,
            compute_pipeline,
            bind_group,
            output_texture,
        })
    }

    /// Constructor closure suitable for [`StageRegistry::register`]
    pub fn constructor(spec: KernelSpec) -> impl Fn(&StageDescriptor<'_, WgpuContext>) -> Result<Box<dyn EffectStage<WgpuContext>>> + 'static {
        move |desc: &StageDescriptor<'_, WgpuContext>| {
            let stage: Box<dyn EffectStage<WgpuContext>> = Box::new(KernelStage::new(&spec, desc)?);
            Ok(stage)
        }
    }
}

impl EffectStage<WgpuContext> for KernelStage {
    fn process(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });

        compute_pass.set_pipeline(&self.compute_pipeline);
        compute_pass.set_bind_group(0, &self.bind_group, &[]);

        let workgroup_x = self.compute_dimensions.width.div_ceil(COMPUTE_WORKGROUP_SIZE_X);
        let workgroup_y = self.compute_dimensions.height.div_ceil(COMPUTE_WORKGROUP_SIZE_Y);
        compute_pass.dispatch_workgroups(workgroup_x, workgroup_y, 1);
    }

    fn output_texture(&self) -> &wgpu::Texture {
        &self.output_texture
    }

    fn dispose(&mut self, _gpu: &WgpuContext) -> Result<()> {
        self.output_texture.destroy();
        Ok(())
    }
}

impl StageRegistry<WgpuContext> {
    /// A registry holding the built-in kernels
    ///
    /// [`kernels::DOWNSCALE`] is registered under [`DOWNSCALE_STAGE`], which
    /// enables intermediate downscaling; [`kernels::BILINEAR_X2`] under its label.
    pub fn with_builtin_stages() -> Self {
        StageRegistry::new()
            .with(DOWNSCALE_STAGE, KernelStage::constructor(kernels::DOWNSCALE))
            .with(kernels::BILINEAR_X2.label, KernelStage::constructor(kernels::BILINEAR_X2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_size_resolution() {
        let native = Dimensions::new(640, 360);
        let target = Dimensions::new(1000, 500);
        assert_eq!(OutputSize::Native.resolve(native, target), native);
        assert_eq!(OutputSize::Scaled(2).resolve(native, target), Dimensions::new(1280, 720));
        assert_eq!(OutputSize::Target.resolve(native, target), target);
        assert_eq!(kernels::DOWNSCALE.output_size.resolve(native, target), target);
    }

    #[test]
    fn test_builtin_registry() {
        let registry = StageRegistry::<WgpuContext>::with_builtin_stages();
        assert!(registry.downscale().is_some());
        assert!(registry.contains("UpscaleBilinearx2"));
        assert!(!registry.contains("Copy"));
    }

    #[test]
    fn test_kernel_sources_declare_expected_bindings() {
        for spec in [kernels::DOWNSCALE, kernels::BILINEAR_X2, kernels::COPY] {
            assert!(spec.source.contains("@binding(0) var input_texture"));
            assert!(spec.source.contains("@binding(2) var output_texture: texture_storage_2d<rgba16float, write>"));
            assert!(spec.source.contains("@workgroup_size(8, 8)"));
        }
    }
}
