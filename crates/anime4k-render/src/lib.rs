//! Frame-synchronized video enhancement on wgpu
//!
//! This crate runs every displayed frame of a playing video through a chain
//! of GPU effect stages and composites the result onto a presentation surface.
//! The chain is built from an ordered effect list; when an upscaling stage
//! produces more pixels than the remaining stages need, an intermediate
//! downscale is inserted automatically. The engine rebuilds its resources on
//! source resolution changes and live reconfiguration, and tears everything
//! down on the first frame error.

mod compositor;
mod config;
mod dimensions;
mod engine;
mod error;
mod gpu;
mod kernel_stage;
mod pipeline_builder;
mod scheduler;
mod stage;
mod video;
mod wgpu_context;

pub mod presets;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
mod testing;

pub use compositor::SurfaceCompositor;
pub use config::{EngineConfig, EnhancementEffect, TargetResolution};
pub use dimensions::{Dimensions, ScaleFactor, ScaleFactorParseError};
pub use engine::{EngineOptions, ErrorCallback, FirstFrameCallback, RenderEngine};
pub use error::{EngineError, Result};
pub use gpu::{Compositor, Gpu};
pub use kernel_stage::{KernelSpec, KernelStage, OutputSize, kernels};
pub use pipeline_builder::{ChainedStage, PipelineBuilder, StageChain, StageKind};
pub use scheduler::{FrameScheduler, SchedulerState, TickOutcome};
pub use stage::{DOWNSCALE_STAGE, EffectStage, IdentityStage, StageConstructor, StageDescriptor, StageRegistry};
pub use video::{FrameCallbackId, FrameClock, ReadyState, VideoSource};
pub use wgpu_context::{FRAME_TEXTURE_FORMAT, WgpuContext};
