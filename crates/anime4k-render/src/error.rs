//! Error types for the render engine
//!
//! Setup failures are returned to the caller of the failing operation. Failures
//! raised while a frame is being processed never reach a caller; the engine
//! reports them through its error callback and tears itself down.

use crate::dimensions::Dimensions;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the render engine and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No GPU adapter compatible with the presentation surface was found
    #[error("no suitable GPU adapter available: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),

    /// The adapter refused to create a device
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The presentation surface could not be created for the host target
    #[error("failed to create presentation surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    /// The adapter reports no usable format for the presentation surface
    #[error("presentation surface is not supported by the selected adapter")]
    SurfaceUnsupported,

    /// The presentation surface has been detached from the device
    #[error("presentation surface has been detached")]
    SurfaceDetached,

    /// Acquiring the next presentable frame failed
    #[error("failed to acquire surface frame: {0}")]
    SurfaceFrame(#[from] wgpu::SurfaceError),

    /// An effect stage constructor rejected its descriptor
    #[error("failed to construct stage '{class_name}': {reason}")]
    StageConstruction {
        /// Registry identifier of the stage being constructed
        class_name: String,
        /// Human-readable failure description
        reason: String,
    },

    /// Releasing the resources owned by a stage failed
    #[error("failed to dispose stage '{class_name}': {reason}")]
    StageDisposal {
        /// Registry identifier of the stage being disposed
        class_name: String,
        /// Human-readable failure description
        reason: String,
    },

    /// Copying the current video frame into the source texture failed
    #[error("failed to copy video frame: {0}")]
    FrameCopy(String),

    /// The video refused to schedule a callback for its next displayed frame
    #[error("failed to request frame callback: {0}")]
    FrameCallback(String),

    /// The compositor pipeline failed validation while being compiled
    #[error("failed to compile compositor pipeline: {0}")]
    CompositorCompilation(String),

    /// A draw was requested before any texture was bound to the compositor
    #[error("compositor has no texture bound")]
    CompositorUnbound,

    /// A GPU resource could not be released during teardown
    #[error("failed to release GPU resource: {0}")]
    Release(String),

    /// Zero-sized dimensions were supplied where a drawable size is required
    #[error("invalid dimensions {0}")]
    InvalidDimensions(Dimensions),

    /// A target resolution setting could not be interpreted
    #[error("invalid target resolution: {0}")]
    InvalidTargetResolution(String),

    /// A preset name matched no known mode or performance level
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// An engine configuration document could not be parsed
    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a stage construction error for the given registry identifier
    pub fn stage_construction(class_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StageConstruction {
            class_name: class_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a stage disposal error for the given registry identifier
    pub fn stage_disposal(class_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StageDisposal {
            class_name: class_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a frame copy error
    pub fn frame_copy(reason: impl Into<String>) -> Self {
        Self::FrameCopy(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_errors_name_the_stage() {
        let err = EngineError::stage_construction("CNNx2M", "out of memory");
        assert_eq!(err.to_string(), "failed to construct stage 'CNNx2M': out of memory");

        let err = EngineError::stage_disposal("Downscale", "device lost");
        assert!(err.to_string().contains("'Downscale'"));
    }

    #[test]
    fn test_invalid_dimensions_display() {
        let err = EngineError::InvalidDimensions(Dimensions::new(0, 720));
        assert_eq!(err.to_string(), "invalid dimensions 0x720");
    }
}
