//! wgpu implementation of the GPU seam
//!
//! Owns the adapter, device, queue and the configured presentation surface.
//! Source textures and stage outputs use a half-float format so that decoded
//! frames keep their precision through the chain.

use crate::compositor::SurfaceCompositor;
use crate::dimensions::Dimensions;
use crate::error::{EngineError, Result};
use crate::gpu::Gpu;

/// Format of the source texture and of the textures written by kernel stages
pub const FRAME_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Device, queue and presentation surface
#[derive(Debug)]
pub struct WgpuContext {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// `None` once detached
    surface: Option<wgpu::Surface<'static>>,
    surface_configuration: wgpu::SurfaceConfiguration,
}

impl WgpuContext {
    /// Requests an adapter and device compatible with `surface` and configures the surface
    ///
    /// # Arguments
    /// * `instance` - The wgpu instance `surface` was created from
    /// * `surface` - Presentation surface of the host window or canvas
    /// * `size` - Initial surface size in physical pixels
    ///
    /// # Errors
    /// Returns an error if no adapter or device is available, or if the
    /// adapter reports no usable surface format.
    pub async fn new(instance: &wgpu::Instance, surface: wgpu::Surface<'static>, size: Dimensions) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: Self::power_preference(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("anime4k-render device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let surface_format = surface_capabilities
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_capabilities.formats.first())
            .copied()
            .ok_or(EngineError::SurfaceUnsupported)?;

        let alpha_mode = if surface_capabilities.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_capabilities.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let surface_configuration = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            view_formats: vec![surface_format.remove_srgb_suffix()],
            alpha_mode,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_configuration);

        let adapter_info = adapter.get_info();
        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            format = ?surface_format,
            alpha_mode = ?alpha_mode,
            "GPU context ready"
        );

        Ok(Self {
            adapter,
            device,
            queue,
            surface: Some(surface),
            surface_configuration,
        })
    }

    /// Windows browsers warn about an explicit preference, so it is left unset there
    fn power_preference() -> wgpu::PowerPreference {
        if cfg!(target_os = "windows") {
            wgpu::PowerPreference::None
        } else {
            wgpu::PowerPreference::HighPerformance
        }
    }

    /// Reconfigures the surface for a new host size; zero sizes are ignored
    pub fn resize_surface(&mut self, size: Dimensions) {
        if size.is_empty() {
            return;
        }
        self.surface_configuration.width = size.width;
        self.surface_configuration.height = size.height;
        if let Some(surface) = self.surface.as_ref() {
            surface.configure(&self.device, &self.surface_configuration);
        }
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Format the compositor renders in; always the non-sRGB variant of the surface format
    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.surface_configuration.format.remove_srgb_suffix()
    }

    pub fn surface_dimensions(&self) -> Dimensions {
        Dimensions::new(self.surface_configuration.width, self.surface_configuration.height)
    }

    /// Creates a texture that kernel stages can write and later stages can sample
    pub fn create_stage_texture(&self, label: &str, dimensions: Dimensions) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: dimensions.to_extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }
}

impl Gpu for WgpuContext {
    type Texture = wgpu::Texture;
    type Encoder = wgpu::CommandEncoder;
    type Frame = wgpu::SurfaceTexture;
    type Compositor = SurfaceCompositor;

    fn create_source_texture(&self, dimensions: Dimensions) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Source texture"),
            size: dimensions.to_extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_TEXTURE_FORMAT,
            // External image copies need RENDER_ATTACHMENT on the destination
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    fn texture_dimensions(texture: &wgpu::Texture) -> Dimensions {
        Dimensions::new(texture.width(), texture.height())
    }

    fn destroy_texture(&self, texture: &wgpu::Texture) {
        texture.destroy();
    }

    async fn create_compositor(&self) -> Result<SurfaceCompositor> {
        SurfaceCompositor::new(&self.device, self.target_format()).await
    }

    fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame encoder") })
    }

    fn acquire_frame(&self) -> Result<wgpu::SurfaceTexture> {
        let surface = self.surface.as_ref().ok_or(EngineError::SurfaceDetached)?;
        Ok(surface.get_current_texture()?)
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn present(&self, frame: wgpu::SurfaceTexture) {
        frame.present();
    }

    fn detach_surface(&mut self) -> Result<()> {
        // Dropping the surface unconfigures it
        if self.surface.take().is_some() {
            tracing::debug!("surface detached");
        }
        Ok(())
    }

    fn destroy_device(&mut self) -> Result<()> {
        self.device.destroy();
        Ok(())
    }
}
