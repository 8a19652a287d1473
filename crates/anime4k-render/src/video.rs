//! Video source contract
//!
//! A video source supplies decoded frames and the display clock that paces
//! the render loop: the engine asks for a callback on the next displayed
//! frame, and the host calls [`crate::RenderEngine::tick`] when it fires.

use crate::dimensions::Dimensions;
use crate::error::Result;
use crate::gpu::Gpu;
use std::future::Future;

/// How much media data the source has buffered
///
/// Mirrors the HTML media `readyState` ladder; later variants compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    /// No information about the media
    HaveNothing,
    /// Dimensions and duration are known
    HaveMetadata,
    /// The frame at the current position is available
    HaveCurrentData,
    /// The current frame and at least the next one are available
    HaveFutureData,
    /// Enough data is buffered to play through
    HaveEnoughData,
}

impl ReadyState {
    /// Converts an HTML media `readyState` value, saturating at [`ReadyState::HaveEnoughData`]
    pub fn from_html(value: u16) -> Self {
        match value {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }
}

/// Handle of a pending per-frame callback registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameCallbackId(pub u32);

/// Display clock of a video source
pub trait FrameClock {
    /// Requests one callback when the next frame is presented
    ///
    /// # Errors
    /// Returns [`crate::EngineError::FrameCallback`] if the source cannot
    /// schedule the callback; no callback is pending afterwards.
    fn request_frame_callback(&mut self) -> Result<FrameCallbackId>;

    /// Cancels a pending callback; unknown or already fired handles are ignored
    fn cancel_frame_callback(&mut self, id: FrameCallbackId);
}

/// A playing video whose frames can be uploaded to the GPU
pub trait VideoSource<G: Gpu>: FrameClock {
    /// Intrinsic decoded size of the current frame
    fn native_dimensions(&self) -> Dimensions;

    /// Whether playback is paused
    fn is_paused(&self) -> bool;

    /// Current buffering state
    fn ready_state(&self) -> ReadyState;

    /// Resolves once the source reports at least [`ReadyState::HaveFutureData`]
    fn wait_for_future_data(&self) -> impl Future<Output = ()>;

    /// Copies the current decoded frame into `texture`, which has the native size
    fn copy_frame_to(&self, gpu: &G, texture: &G::Texture) -> Result<()>;
}
