//! GPU seam used by the engine
//!
//! The engine only ever talks to the GPU through [`Gpu`] and [`Compositor`].
//! [`crate::WgpuContext`] and [`crate::SurfaceCompositor`] implement them on
//! top of wgpu; keeping the engine generic lets the chain and lifecycle logic
//! run against any backend that can hand out textures and command encoders.

use crate::dimensions::Dimensions;
use crate::error::Result;
use std::fmt;
use std::future::Future;

/// Device, queue and presentation surface as seen by the engine
pub trait Gpu: Sized + 'static {
    /// Texture handle; clones refer to the same GPU texture
    type Texture: Clone + fmt::Debug;
    /// Records the commands of one frame
    type Encoder;
    /// A frame acquired from the presentation surface
    type Frame;
    /// The final pass drawing a texture onto [`Gpu::Frame`]s
    type Compositor: Compositor<Self>;

    /// Creates the texture that receives decoded video frames
    fn create_source_texture(&self, dimensions: Dimensions) -> Self::Texture;

    /// Pixel size of a texture
    fn texture_dimensions(texture: &Self::Texture) -> Dimensions;

    /// Releases a texture's GPU memory; the handle must not be used afterwards
    fn destroy_texture(&self, texture: &Self::Texture);

    /// Builds the compositor for the configured presentation format
    fn create_compositor(&self) -> impl Future<Output = Result<Self::Compositor>>;

    /// Starts recording a new command buffer
    fn create_encoder(&self) -> Self::Encoder;

    /// Acquires the next presentable frame
    fn acquire_frame(&self) -> Result<Self::Frame>;

    /// Finishes and submits a command buffer
    fn submit(&self, encoder: Self::Encoder);

    /// Queues an acquired frame for presentation
    fn present(&self, frame: Self::Frame);

    /// Detaches the presentation surface from the device
    fn detach_surface(&mut self) -> Result<()>;

    /// Destroys the device; every resource created from it becomes invalid
    fn destroy_device(&mut self) -> Result<()>;
}

/// Draws a texture onto the presentation surface
pub trait Compositor<G: Gpu> {
    /// Rebuilds the bind state so that subsequent draws sample `texture`
    fn bind(&mut self, gpu: &G, texture: &G::Texture);

    /// Records the full-surface draw into `encoder`, targeting `frame`
    fn draw(&self, encoder: &mut G::Encoder, frame: &G::Frame) -> Result<()>;
}
