//! The seam between the presentation engine and the Vulkan driver.
//!
//! [`PresentationEngine`](crate::PresentationEngine) drives every Vulkan
//! object through [`VulkanApi`]. [`AshApi`](crate::AshApi) forwards to the
//! real driver through `ash`; tests substitute a recording implementation
//! to check creation order, teardown order and the frame protocol without
//! a GPU.

use std::ffi::CStr;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::RendererError;

/// Parameters for `vkCreateInstance`.
#[derive(Debug, Clone)]
pub struct InstanceDesc<'a> {
    pub application_name: &'a str,
    pub engine_name: &'a str,
    pub extensions: &'a [&'static CStr],
    pub layers: &'a [&'static CStr],
    /// Chain a debug messenger into instance creation so that messages
    /// raised while the instance is created are logged too.
    pub debug_messenger: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub index: u32,
    pub flags: vk::QueueFlags,
}

/// What device selection needs to know about one physical device.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub extensions: Vec<String>,
    pub queue_families: Vec<QueueFamilyInfo>,
}

/// Parameters for `vkCreateSwapchainKHR`. Usage is always colour
/// attachment, sharing exclusive, alpha opaque and clipping on.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
    /// No image became available before the timeout.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Every driver call the presentation engine makes.
///
/// Destroy calls cannot fail and ignore null handles. Creation calls that
/// need an instance or device return [`RendererError::NotConnected`] when
/// it does not exist yet.
pub trait VulkanApi {
    fn instance_extensions(&self) -> Result<Vec<String>, RendererError>;
    fn instance_layers(&self) -> Result<Vec<String>, RendererError>;
    fn create_instance(&mut self, desc: &InstanceDesc<'_>) -> Result<(), RendererError>;
    fn destroy_instance(&mut self);

    fn create_debug_messenger(&mut self) -> Result<vk::DebugUtilsMessengerEXT, RendererError>;
    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT);

    fn create_surface(
        &mut self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR, RendererError>;
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    fn physical_devices(&self) -> Result<Vec<PhysicalDeviceInfo>, RendererError>;
    fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool, RendererError>;

    /// Creates the logical device with one queue from `queue_family`.
    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&'static CStr],
    ) -> Result<(), RendererError>;
    fn destroy_device(&mut self);

    fn create_command_pool(&mut self, queue_family: u32) -> Result<vk::CommandPool, RendererError>;
    fn destroy_command_pool(&mut self, pool: vk::CommandPool);

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR, RendererError>;
    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, RendererError>;
    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>, RendererError>;

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR, RendererError>;
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>, RendererError>;

    /// Single colour attachment, cleared on load and kept for presentation.
    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass, RendererError>;
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView, RendererError>;
    fn destroy_image_view(&mut self, view: vk::ImageView);

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer, RendererError>;
    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);

    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> Result<vk::CommandBuffer, RendererError>;
    fn free_command_buffer(&mut self, pool: vk::CommandPool, command_buffer: vk::CommandBuffer);

    fn create_semaphore(&mut self) -> Result<vk::Semaphore, RendererError>;
    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore);

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence, RendererError>;
    fn destroy_fence(&mut self, fence: vk::Fence);

    /// Returns `false` when `timeout_ns` elapsed before the fence signalled.
    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> Result<bool, RendererError>;
    fn reset_fence(&mut self, fence: vk::Fence) -> Result<(), RendererError>;

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> Result<AcquireOutcome, RendererError>;

    /// Records a one-time-submit buffer that begins and ends `render_pass`
    /// over the whole framebuffer, clearing it to `clear_color`.
    fn record_clear_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<(), RendererError>;

    /// Submits `command_buffer`, waiting on `wait` at the colour-attachment
    /// output stage and signalling `signal` and `fence`.
    fn submit(
        &mut self,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<(), RendererError>;

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<PresentOutcome, RendererError>;

    fn device_wait_idle(&mut self) -> Result<(), RendererError>;
}
