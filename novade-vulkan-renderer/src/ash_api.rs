//! [`VulkanApi`] on top of the system Vulkan loader via `ash`.

use std::borrow::Cow;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use ash::extensions::{ext::DebugUtils, khr};
use ash::{vk, Device, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info};

use crate::api::{
    AcquireOutcome, InstanceDesc, PhysicalDeviceInfo, PresentOutcome, QueueFamilyInfo, SwapchainDesc, VulkanApi,
};
use crate::error::RendererError;
use crate::render_pass;

/// Routes validation-layer messages into `tracing` under the `vulkan` target.
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let message_id_number = callback_data.message_id_number;

    let message_id_name = if callback_data.p_message_id_name.is_null() {
        Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };

    let message = if callback_data.p_message.is_null() {
        Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            tracing::debug!(target: "vulkan", "[VERBOSE] type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!(target: "vulkan", "[INFO] type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vulkan", "[WARNING] type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vulkan", "[ERROR] type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        _ => {
            tracing::trace!(target: "vulkan", "[UNKNOWN] severity: {:?}, type: {:?}, id: {} ({}), message: {}", message_severity, message_type, message_id_name, message_id_number, message);
        }
    }
    vk::FALSE
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

fn name_from_raw(raw: &[c_char]) -> String {
    // SAFETY: Vulkan guarantees NUL-terminated fixed-size name arrays.
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
}

fn name_pointers(names: &[&'static CStr]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

/// Driver-backed [`VulkanApi`]. Owns the loader, the instance, the device
/// and the extension function tables that hang off them.
pub struct AshApi {
    entry: Entry,
    instance: Option<Instance>,
    debug_utils: Option<DebugUtils>,
    surface_loader: Option<khr::Surface>,
    wayland_surface_loader: Option<khr::WaylandSurface>,
    device: Option<Device>,
    swapchain_loader: Option<khr::Swapchain>,
    queue: vk::Queue,
}

impl AshApi {
    /// Opens the system Vulkan loader.
    pub fn load() -> Result<Self, RendererError> {
        // SAFETY: loading the library runs no Vulkan code besides its initialisers.
        let entry = unsafe { Entry::load()? };
        debug!("Vulkan loader opened");
        Ok(Self {
            entry,
            instance: None,
            debug_utils: None,
            surface_loader: None,
            wayland_surface_loader: None,
            device: None,
            swapchain_loader: None,
            queue: vk::Queue::null(),
        })
    }

    fn instance(&self) -> Result<&Instance, RendererError> {
        self.instance.as_ref().ok_or(RendererError::NotConnected)
    }

    fn device(&self) -> Result<&Device, RendererError> {
        self.device.as_ref().ok_or(RendererError::NotConnected)
    }

    fn surface_loader(&self) -> Result<&khr::Surface, RendererError> {
        self.surface_loader.as_ref().ok_or(RendererError::NotConnected)
    }

    fn swapchain_loader(&self) -> Result<&khr::Swapchain, RendererError> {
        self.swapchain_loader.as_ref().ok_or(RendererError::NotConnected)
    }
}

impl VulkanApi for AshApi {
    fn instance_extensions(&self) -> Result<Vec<String>, RendererError> {
        let properties = self
            .entry
            .enumerate_instance_extension_properties(None)
            .map_err(RendererError::enumeration("instance extensions"))?;
        Ok(properties.iter().map(|p| name_from_raw(&p.extension_name)).collect())
    }

    fn instance_layers(&self) -> Result<Vec<String>, RendererError> {
        let properties = self
            .entry
            .enumerate_instance_layer_properties()
            .map_err(RendererError::enumeration("instance layers"))?;
        Ok(properties.iter().map(|p| name_from_raw(&p.layer_name)).collect())
    }

    fn create_instance(&mut self, desc: &InstanceDesc<'_>) -> Result<(), RendererError> {
        if self.instance.is_some() {
            return Err(RendererError::AlreadyConnected);
        }
        let app_name = CString::new(desc.application_name)?;
        let engine_name = CString::new(desc.engine_name)?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_names = name_pointers(desc.extensions);
        let layer_names = name_pointers(desc.layers);
        let mut messenger_info = debug_messenger_info();

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);
        if desc.debug_messenger {
            create_info = create_info.push_next(&mut messenger_info);
        }

        let instance = unsafe { self.entry.create_instance(&create_info, None) }
            .map_err(RendererError::vulkan("vkCreateInstance"))?;
        info!("Vulkan instance created successfully.");

        self.surface_loader = Some(khr::Surface::new(&self.entry, &instance));
        self.wayland_surface_loader = Some(khr::WaylandSurface::new(&self.entry, &instance));
        if desc.debug_messenger {
            self.debug_utils = Some(DebugUtils::new(&self.entry, &instance));
        }
        self.instance = Some(instance);
        Ok(())
    }

    fn destroy_instance(&mut self) {
        self.debug_utils = None;
        self.surface_loader = None;
        self.wayland_surface_loader = None;
        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
        }
    }

    fn create_debug_messenger(&mut self) -> Result<vk::DebugUtilsMessengerEXT, RendererError> {
        let loader = self
            .debug_utils
            .as_ref()
            .ok_or_else(|| RendererError::MissingExtension(DebugUtils::name().to_string_lossy().into_owned()))?;
        let info = debug_messenger_info();
        let messenger = unsafe { loader.create_debug_utils_messenger(&info, None) }
            .map_err(RendererError::vulkan("vkCreateDebugUtilsMessengerEXT"))?;
        info!("Vulkan debug messenger created successfully.");
        Ok(messenger)
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Some(loader) = &self.debug_utils {
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn create_surface(
        &mut self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR, RendererError> {
        let (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) = (display, window) else {
            return Err(RendererError::UnsupportedPlatform);
        };
        let loader = self
            .wayland_surface_loader
            .as_ref()
            .ok_or(RendererError::NotConnected)?;
        let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
            .display(display.display.as_ptr())
            .surface(window.surface.as_ptr());
        // SAFETY: both pointers come from a live Wayland connection and
        // surface that outlive the Vulkan surface.
        unsafe { loader.create_wayland_surface(&create_info, None) }
            .map_err(RendererError::vulkan("vkCreateWaylandSurfaceKHR"))
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(loader) = &self.surface_loader {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn physical_devices(&self) -> Result<Vec<PhysicalDeviceInfo>, RendererError> {
        let instance = self.instance()?;
        let handles = unsafe { instance.enumerate_physical_devices() }
            .map_err(RendererError::enumeration("physical devices"))?;

        handles
            .into_iter()
            .map(|handle| -> Result<PhysicalDeviceInfo, RendererError> {
                let properties = unsafe { instance.get_physical_device_properties(handle) };
                let extensions = unsafe { instance.enumerate_device_extension_properties(handle) }
                    .map_err(RendererError::enumeration("device extensions"))?
                    .iter()
                    .map(|p| name_from_raw(&p.extension_name))
                    .collect();
                let queue_families = unsafe { instance.get_physical_device_queue_family_properties(handle) }
                    .iter()
                    .enumerate()
                    .map(|(index, family)| QueueFamilyInfo {
                        index: index as u32,
                        flags: family.queue_flags,
                    })
                    .collect();
                Ok(PhysicalDeviceInfo {
                    handle,
                    name: name_from_raw(&properties.device_name),
                    device_type: properties.device_type,
                    extensions,
                    queue_families,
                })
            })
            .collect()
    }

    fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool, RendererError> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_support(physical_device, queue_family, surface)
        }
        .map_err(RendererError::vulkan("vkGetPhysicalDeviceSurfaceSupportKHR"))
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&'static CStr],
    ) -> Result<(), RendererError> {
        let instance = self.instance.as_ref().ok_or(RendererError::NotConnected)?;
        let priorities = [1.0_f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)
            .build()];
        let extension_names = name_pointers(extensions);
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(RendererError::vulkan("vkCreateDevice"))?;
        info!("Logical device created successfully.");

        self.queue = unsafe { device.get_device_queue(queue_family, 0) };
        self.swapchain_loader = Some(khr::Swapchain::new(instance, &device));
        self.device = Some(device);
        Ok(())
    }

    fn destroy_device(&mut self) {
        self.swapchain_loader = None;
        self.queue = vk::Queue::null();
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn create_command_pool(&mut self, queue_family: u32) -> Result<vk::CommandPool, RendererError> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        unsafe { self.device()?.create_command_pool(&create_info, None) }
            .map_err(RendererError::vulkan("vkCreateCommandPool"))
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_command_pool(pool, None) };
        }
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR, RendererError> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(physical_device, surface)
        }
        .map_err(RendererError::vulkan("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, RendererError> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_formats(physical_device, surface)
        }
        .map_err(RendererError::enumeration("surface formats"))
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>, RendererError> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_present_modes(physical_device, surface)
        }
        .map_err(RendererError::enumeration("surface present modes"))
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR, RendererError> {
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(desc.surface)
            .min_image_count(desc.min_image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());
        unsafe { self.swapchain_loader()?.create_swapchain(&create_info, None) }
            .map_err(RendererError::vulkan("vkCreateSwapchainKHR"))
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if let Some(loader) = &self.swapchain_loader {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>, RendererError> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
            .map_err(RendererError::enumeration("swapchain images"))
    }

    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass, RendererError> {
        unsafe { render_pass::create_clear_render_pass(self.device()?, format) }
            .map_err(RendererError::vulkan("vkCreateRenderPass"))
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView, RendererError> {
        unsafe { render_pass::create_color_view(self.device()?, image, format) }
            .map_err(RendererError::vulkan("vkCreateImageView"))
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_image_view(view, None) };
        }
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer, RendererError> {
        unsafe { render_pass::create_framebuffer(self.device()?, render_pass, view, extent) }
            .map_err(RendererError::vulkan("vkCreateFramebuffer"))
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> Result<vk::CommandBuffer, RendererError> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device()?.allocate_command_buffers(&allocate_info) }
            .map_err(RendererError::vulkan("vkAllocateCommandBuffers"))?;
        buffers.into_iter().next().ok_or(RendererError::Vulkan {
            op: "vkAllocateCommandBuffers",
            result: vk::Result::ERROR_UNKNOWN,
        })
    }

    fn free_command_buffer(&mut self, pool: vk::CommandPool, command_buffer: vk::CommandBuffer) {
        if let Some(device) = &self.device {
            unsafe { device.free_command_buffers(pool, &[command_buffer]) };
        }
    }

    fn create_semaphore(&mut self) -> Result<vk::Semaphore, RendererError> {
        let create_info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device()?.create_semaphore(&create_info, None) }
            .map_err(RendererError::vulkan("vkCreateSemaphore"))
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_semaphore(semaphore, None) };
        }
    }

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence, RendererError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device()?.create_fence(&create_info, None) }.map_err(RendererError::vulkan("vkCreateFence"))
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_fence(fence, None) };
        }
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> Result<bool, RendererError> {
        match unsafe { self.device()?.wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(result) => Err(RendererError::Vulkan {
                op: "vkWaitForFences",
                result,
            }),
        }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<(), RendererError> {
        unsafe { self.device()?.reset_fences(&[fence]) }.map_err(RendererError::vulkan("vkResetFences"))
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> Result<AcquireOutcome, RendererError> {
        let result = unsafe {
            self.swapchain_loader()?
                .acquire_next_image(swapchain, timeout_ns, signal, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireOutcome::Timeout),
            Err(result) => Err(RendererError::Vulkan {
                op: "vkAcquireNextImageKHR",
                result,
            }),
        }
    }

    fn record_clear_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<(), RendererError> {
        let device = self.device()?;
        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        }];
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(RendererError::vulkan("vkResetCommandBuffer"))?;
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RendererError::vulkan("vkBeginCommandBuffer"))?;
            device.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_end_render_pass(command_buffer);
            device
                .end_command_buffer(command_buffer)
                .map_err(RendererError::vulkan("vkEndCommandBuffer"))
        }
    }

    fn submit(
        &mut self,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<(), RendererError> {
        let device = self.device()?;
        let wait_semaphores = [wait];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [signal];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        unsafe { device.queue_submit(self.queue, &[submit_info], fence) }
            .map_err(RendererError::vulkan("vkQueueSubmit"))
    }

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<PresentOutcome, RendererError> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        match unsafe { self.swapchain_loader()?.queue_present(self.queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(result) => Err(RendererError::Vulkan {
                op: "vkQueuePresentKHR",
                result,
            }),
        }
    }

    fn device_wait_idle(&mut self) -> Result<(), RendererError> {
        unsafe { self.device()?.device_wait_idle() }.map_err(RendererError::vulkan("vkDeviceWaitIdle"))
    }
}

impl Drop for AshApi {
    fn drop(&mut self) {
        // The engine releases every child object first; these only run if
        // it never got the chance.
        self.destroy_device();
        self.destroy_instance();
    }
}
