use ash::vk;
use novade_core::Extent;
use tracing::debug;

use crate::api::{SwapchainDesc, VulkanApi};
use crate::error::RendererError;

/// `B8G8R8A8_UNORM` when offered, otherwise the first reported format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|candidate| candidate.format == vk::Format::B8G8R8A8_UNORM)
        .or_else(|| formats.first().copied())
}

/// The preferred mode when available, otherwise FIFO, which every
/// implementation must support.
pub fn choose_present_mode(
    preferred: vk::PresentModeKHR,
    available: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// One image more than the minimum, capped by the maximum. A maximum of
/// zero means the surface sets no upper bound.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        wanted.min(capabilities.max_image_count)
    } else {
        wanted
    }
}

/// The surface's current extent, or the window size clamped into the
/// surface limits when the compositor leaves the choice to the client.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window: Extent) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let clamped = window.clamp(
        Extent::new(capabilities.min_image_extent.width, capabilities.min_image_extent.height),
        Extent::new(capabilities.max_image_extent.width, capabilities.max_image_extent.height),
    );
    vk::Extent2D {
        width: clamped.width,
        height: clamped.height,
    }
}

/// Per-image objects of one swapchain generation.
///
/// The fence is created signalled so the first wait on it returns at once.
/// `last_fence` is the frame-slot fence of the most recent submission that
/// rendered into this image.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainElement {
    pub image: vk::Image,
    pub command_buffer: vk::CommandBuffer,
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub acquire_semaphore: vk::Semaphore,
    pub release_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
    pub last_fence: Option<vk::Fence>,
}

impl SwapchainElement {
    fn empty(image: vk::Image) -> Self {
        Self {
            image,
            command_buffer: vk::CommandBuffer::null(),
            image_view: vk::ImageView::null(),
            framebuffer: vk::Framebuffer::null(),
            acquire_semaphore: vk::Semaphore::null(),
            release_semaphore: vk::Semaphore::null(),
            fence: vk::Fence::null(),
            last_fence: None,
        }
    }

    fn create<A: VulkanApi>(
        api: &mut A,
        pool: vk::CommandPool,
        render_pass: vk::RenderPass,
        image: vk::Image,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self, RendererError> {
        let mut element = Self::empty(image);
        if let Err(err) = element.populate(api, pool, render_pass, format, extent) {
            element.destroy(api, pool);
            return Err(err);
        }
        Ok(element)
    }

    fn populate<A: VulkanApi>(
        &mut self,
        api: &mut A,
        pool: vk::CommandPool,
        render_pass: vk::RenderPass,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<(), RendererError> {
        self.command_buffer = api.allocate_command_buffer(pool)?;
        self.image_view = api.create_image_view(self.image, format)?;
        self.framebuffer = api.create_framebuffer(render_pass, self.image_view, extent)?;
        self.acquire_semaphore = api.create_semaphore()?;
        self.release_semaphore = api.create_semaphore()?;
        self.fence = api.create_fence(true)?;
        debug!(image = ?self.image, view = ?self.image_view, fence = ?self.fence, "Created swapchain element");
        Ok(())
    }

    /// Releases in reverse creation order, skipping objects never created.
    fn destroy<A: VulkanApi>(self, api: &mut A, pool: vk::CommandPool) {
        debug!(image = ?self.image, "Destroying swapchain element");
        if self.fence != vk::Fence::null() {
            api.destroy_fence(self.fence);
        }
        if self.release_semaphore != vk::Semaphore::null() {
            api.destroy_semaphore(self.release_semaphore);
        }
        if self.acquire_semaphore != vk::Semaphore::null() {
            api.destroy_semaphore(self.acquire_semaphore);
        }
        if self.framebuffer != vk::Framebuffer::null() {
            api.destroy_framebuffer(self.framebuffer);
        }
        if self.image_view != vk::ImageView::null() {
            api.destroy_image_view(self.image_view);
        }
        if self.command_buffer != vk::CommandBuffer::null() {
            api.free_command_buffer(pool, self.command_buffer);
        }
    }
}

/// One swapchain generation: the swapchain, its render pass and one
/// element per image. Replaced wholesale on resize or when out of date.
#[derive(Debug, Clone)]
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub render_pass: vk::RenderPass,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub elements: Vec<SwapchainElement>,
}

impl Swapchain {
    /// Creates the swapchain and everything that hangs off it. On failure
    /// every object created so far is released again.
    pub fn create<A: VulkanApi>(
        api: &mut A,
        desc: &SwapchainDesc,
        pool: vk::CommandPool,
    ) -> Result<Self, RendererError> {
        let handle = api.create_swapchain(desc)?;
        debug!(?handle, "Created swapchain");
        let mut swapchain = Self {
            handle,
            render_pass: vk::RenderPass::null(),
            format: desc.format,
            extent: desc.extent,
            present_mode: desc.present_mode,
            elements: Vec::new(),
        };
        if let Err(err) = swapchain.populate(api, pool) {
            swapchain.destroy(api, pool);
            return Err(err);
        }
        Ok(swapchain)
    }

    fn populate<A: VulkanApi>(&mut self, api: &mut A, pool: vk::CommandPool) -> Result<(), RendererError> {
        self.render_pass = api.create_render_pass(self.format.format)?;
        debug!(render_pass = ?self.render_pass, "Created render pass");
        let images = api.swapchain_images(self.handle)?;
        self.elements.reserve(images.len());
        for image in images {
            let element = SwapchainElement::create(
                api,
                pool,
                self.render_pass,
                image,
                self.format.format,
                self.extent,
            )?;
            self.elements.push(element);
        }
        Ok(())
    }

    /// Releases the generation in exact reverse creation order. The device
    /// must be idle.
    pub fn destroy<A: VulkanApi>(self, api: &mut A, pool: vk::CommandPool) {
        for element in self.elements.into_iter().rev() {
            element.destroy(api, pool);
        }
        if self.render_pass != vk::RenderPass::null() {
            api.destroy_render_pass(self.render_pass);
        }
        debug!(handle = ?self.handle, "Destroying swapchain");
        api.destroy_swapchain(self.handle);
    }

    pub fn image_count(&self) -> usize {
        self.elements.len()
    }
}
