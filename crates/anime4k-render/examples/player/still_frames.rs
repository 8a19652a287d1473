//! A video source that plays a list of still images
//!
//! Each image is held for a fixed number of displayed frames. The display
//! clock is the window's redraw loop: a requested frame callback becomes due
//! on the next redraw.

use anime4k_render::{Dimensions, EngineError, FrameCallbackId, FrameClock, ReadyState, VideoSource, WgpuContext};
use half::f16;
use std::path::PathBuf;

/// One decoded image in the source texture's layout
struct Frame {
    dimensions: Dimensions,
    /// RGBA half-float texels, row-major
    texels: Vec<f16>,
}

pub struct StillFrameSource {
    frames: Vec<Frame>,
    current: usize,
    frames_per_image: u32,
    displayed: u32,
    paused: bool,
    next_callback: u32,
    pending: Option<FrameCallbackId>,
}

impl StillFrameSource {
    /// Decodes every image up front
    pub fn load(paths: &[PathBuf], frames_per_image: u32, paused: bool) -> Result<Self, image::ImageError> {
        let frames = paths
            .iter()
            .map(|path| {
                let image = image::open(path)?.to_rgba32f();
                let dimensions = Dimensions::new(image.width(), image.height());
                tracing::info!(path = %path.display(), %dimensions, "loaded image");
                Ok(Frame {
                    dimensions,
                    texels: image.into_raw().into_iter().map(f16::from_f32).collect(),
                })
            })
            .collect::<Result<Vec<_>, image::ImageError>>()?;

        Ok(Self {
            frames,
            current: 0,
            frames_per_image: frames_per_image.max(1),
            displayed: 0,
            paused,
            next_callback: 0,
            pending: None,
        })
    }

    /// Pauses or resumes; returns the new paused state
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Advances the slideshow by one displayed frame
    ///
    /// # Returns
    /// `true` if a frame callback was pending and is now due
    pub fn display_frame(&mut self) -> bool {
        if !self.paused && !self.frames.is_empty() {
            self.displayed += 1;
            if self.displayed >= self.frames_per_image {
                self.displayed = 0;
                self.current = (self.current + 1) % self.frames.len();
            }
        }
        self.pending.take().is_some()
    }
}

impl FrameClock for StillFrameSource {
    fn request_frame_callback(&mut self) -> anime4k_render::Result<FrameCallbackId> {
        self.next_callback += 1;
        let id = FrameCallbackId(self.next_callback);
        self.pending = Some(id);
        Ok(id)
    }

    fn cancel_frame_callback(&mut self, id: FrameCallbackId) {
        if self.pending == Some(id) {
            self.pending = None;
        }
    }
}

impl VideoSource<WgpuContext> for StillFrameSource {
    fn native_dimensions(&self) -> Dimensions {
        self.frames.get(self.current).map_or(Dimensions::new(0, 0), |frame| frame.dimensions)
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn ready_state(&self) -> ReadyState {
        if self.frames.is_empty() { ReadyState::HaveNothing } else { ReadyState::HaveEnoughData }
    }

    async fn wait_for_future_data(&self) {}

    fn copy_frame_to(&self, gpu: &WgpuContext, texture: &wgpu::Texture) -> anime4k_render::Result<()> {
        let frame = self.frames.get(self.current).ok_or_else(|| EngineError::frame_copy("no image loaded"))?;

        gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&frame.texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.dimensions.width * 4 * std::mem::size_of::<f16>() as u32),
                rows_per_image: Some(frame.dimensions.height),
            },
            frame.dimensions.to_extent(),
        );
        Ok(())
    }
}
