//! Vulkan presentation engine for the NovaDE window stack.
//!
//! Connects to the GPU through a Wayland surface, keeps a swapchain sized
//! to the window and clears and presents one image per frame. Stale
//! swapchains (resize, out-of-date, suboptimal) are rebuilt wholesale.
//!
//! ```rust,ignore
//! use novade_vulkan_renderer::{EngineSettings, PresentationEngine};
//!
//! let mut engine = PresentationEngine::load(EngineSettings::default())?;
//! engine.connect(display_handle, window_handle)?;
//! loop {
//!     engine.render_frame()?;
//! }
//! ```

pub mod api;
mod ash_api;
pub mod device_selection;
pub mod engine;
pub mod error;
pub mod frame;
mod render_pass;
pub mod swapchain;
#[cfg(test)]
mod testing;

pub use ash::vk;

pub use api::{AcquireOutcome, PresentOutcome, VulkanApi};
pub use ash_api::AshApi;
pub use engine::{EngineSettings, FrameOutcome, PresentationEngine};
pub use error::RendererError;
pub use frame::FrameCursor;
pub use swapchain::{Swapchain, SwapchainElement};
