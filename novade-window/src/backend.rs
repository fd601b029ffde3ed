//! The two seams the window loop drives.

use novade_core::Extent;
use novade_vulkan_renderer::{FrameOutcome, PresentationEngine, VulkanApi};
use novade_wayland_client::CompositorClient;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::WindowError;

/// The display-server side of a window.
pub trait Compositor {
    fn connect(&mut self) -> Result<(), WindowError>;
    fn disconnect(&mut self);
    /// Pumps pending events with one blocking round trip.
    fn sync(&mut self) -> Result<(), WindowError>;
    fn should_close(&self) -> bool;
    fn close_window(&mut self);
    fn pending_resize(&self) -> Option<Extent>;
    /// Marks the pending resize applied. Call after the presenter was resized.
    fn complete_resize(&mut self) -> Option<Extent>;
    fn native_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), WindowError>;
}

/// The GPU side of a window.
pub trait Presenter {
    fn connect(&mut self, display: RawDisplayHandle, window: RawWindowHandle) -> Result<(), WindowError>;
    fn disconnect(&mut self);
    fn render_frame(&mut self) -> Result<FrameOutcome, WindowError>;
    fn resize(&mut self, extent: Extent) -> Result<(), WindowError>;
}

impl Compositor for CompositorClient {
    fn connect(&mut self) -> Result<(), WindowError> {
        Ok(CompositorClient::connect(self)?)
    }

    fn disconnect(&mut self) {
        CompositorClient::disconnect(self);
    }

    fn sync(&mut self) -> Result<(), WindowError> {
        Ok(CompositorClient::sync(self)?)
    }

    fn should_close(&self) -> bool {
        CompositorClient::should_close(self)
    }

    fn close_window(&mut self) {
        CompositorClient::close_window(self);
    }

    fn pending_resize(&self) -> Option<Extent> {
        CompositorClient::pending_resize(self)
    }

    fn complete_resize(&mut self) -> Option<Extent> {
        CompositorClient::complete_resize(self)
    }

    fn native_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), WindowError> {
        Ok((self.display_handle()?, self.window_handle()?))
    }
}

impl<A: VulkanApi> Presenter for PresentationEngine<A> {
    fn connect(&mut self, display: RawDisplayHandle, window: RawWindowHandle) -> Result<(), WindowError> {
        Ok(PresentationEngine::connect(self, display, window)?)
    }

    fn disconnect(&mut self) {
        PresentationEngine::disconnect(self);
    }

    fn render_frame(&mut self) -> Result<FrameOutcome, WindowError> {
        Ok(PresentationEngine::render_frame(self)?)
    }

    fn resize(&mut self, extent: Extent) -> Result<(), WindowError> {
        Ok(PresentationEngine::resize(self, extent)?)
    }
}
