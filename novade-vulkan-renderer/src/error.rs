//! Error type for the presentation engine.

use ash::vk;
use novade_core::problem::{AsProblem, ProblemCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    /// The Vulkan loader library could not be opened.
    #[error("Failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("Required instance extension '{0}' is not available")]
    MissingExtension(String),

    #[error("Required instance layer '{0}' is not available")]
    MissingLayer(String),

    #[error("Failed to enumerate {what}: {result}")]
    Enumeration { what: &'static str, result: vk::Result },

    /// No physical device offers the swapchain extension with a usable type.
    #[error("No physical device is suitable for presentation")]
    NoSuitableDevice,

    #[error("No queue family of '{device}' supports both graphics and presentation")]
    NoPresentQueue { device: String },

    #[error("{op} failed: {result}")]
    Vulkan { op: &'static str, result: vk::Result },

    /// A fence or acquire wait ran past the configured frame timeout.
    #[error("GPU did not complete {op} within {timeout_ms} ms")]
    FrameStall { op: &'static str, timeout_ms: u64 },

    #[error("Only Wayland display and window handles are supported")]
    UnsupportedPlatform,

    #[error("Name contains an interior NUL byte: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("Presentation engine is already connected")]
    AlreadyConnected,

    #[error("Presentation engine is not connected")]
    NotConnected,

    #[error("No swapchain is running")]
    NoSwapchain,
}

impl RendererError {
    pub(crate) fn vulkan(op: &'static str) -> impl FnOnce(vk::Result) -> RendererError {
        move |result| RendererError::Vulkan { op, result }
    }

    pub(crate) fn enumeration(what: &'static str) -> impl FnOnce(vk::Result) -> RendererError {
        move |result| RendererError::Enumeration { what, result }
    }
}

impl AsProblem for RendererError {
    fn problem_code(&self) -> ProblemCode {
        match self {
            RendererError::Loader(_)
            | RendererError::MissingExtension(_)
            | RendererError::MissingLayer(_)
            | RendererError::UnsupportedPlatform => ProblemCode::MissingCapability,
            RendererError::Enumeration { .. } => ProblemCode::EnumerationFailure,
            RendererError::NoSuitableDevice | RendererError::NoPresentQueue { .. } => {
                ProblemCode::NoSuitableDevice
            }
            RendererError::Vulkan { .. } | RendererError::NotConnected | RendererError::NoSwapchain => {
                ProblemCode::GpuFailure
            }
            RendererError::FrameStall { .. } => ProblemCode::FrameStall,
            RendererError::InvalidName(_) => ProblemCode::Configuration,
            RendererError::AlreadyConnected => ProblemCode::DoubleInit,
        }
    }
}
