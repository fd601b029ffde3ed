//! Recording [`VulkanApi`] for exercising the engine without a GPU.
//!
//! Besides recording calls, the mock tracks which semaphores hold a pending
//! signal and which fences were reset without a submission, and panics on
//! the misuse a real driver would hang or fault on.

use std::collections::{HashSet, VecDeque};
use std::ffi::CStr;

use ash::vk::{self, Handle};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::api::{
    AcquireOutcome, InstanceDesc, PhysicalDeviceInfo, PresentOutcome, QueueFamilyInfo, SwapchainDesc, VulkanApi,
};
use crate::error::RendererError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Instance,
    DebugMessenger,
    Surface,
    Device,
    CommandPool,
    Swapchain,
    RenderPass,
    ImageView,
    Framebuffer,
    CommandBuffer,
    Semaphore,
    Fence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(Kind, u64),
    Destroy(Kind, u64),
    WaitFence(u64),
    ResetFence(u64),
    Acquire { semaphore: u64 },
    Record { command_buffer: u64 },
    Submit { wait: u64, signal: u64, fence: u64 },
    Present { image_index: u32, wait: u64 },
    WaitIdle,
}

pub struct MockApi {
    pub calls: Vec<Call>,
    pub extensions: Vec<String>,
    pub layers: Vec<String>,
    pub devices: Vec<PhysicalDeviceInfo>,
    pub present_support: bool,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// Consumed one per acquire before falling back to round-robin.
    pub acquire_script: VecDeque<AcquireOutcome>,
    pub present_script: VecDeque<PresentOutcome>,
    /// Fence waits report a timeout while set.
    pub fences_stall: bool,
    /// Waits on these fences report a timeout.
    pub stalled_fences: HashSet<u64>,
    /// The next command buffer recording fails.
    pub fail_record: bool,
    /// The next queue submission fails.
    pub fail_submit: bool,
    /// The next creation of this kind fails.
    pub fail_create: Option<Kind>,
    pub last_instance: Option<(Vec<String>, Vec<String>, bool)>,
    live: HashSet<(Kind, u64)>,
    signalled: HashSet<u64>,
    unsubmitted_fences: HashSet<u64>,
    next_handle: u64,
    next_image: u32,
    image_count: u32,
    instance_id: u64,
    device_id: u64,
}

impl MockApi {
    /// One discrete GPU with a graphics and present capable queue family
    /// and a surface that wants two images at minimum.
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            extensions: ["VK_KHR_surface", "VK_KHR_wayland_surface", "VK_EXT_debug_utils"]
                .map(String::from)
                .to_vec(),
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            devices: vec![PhysicalDeviceInfo {
                handle: vk::PhysicalDevice::from_raw(0xD15C),
                name: "Mock Discrete".to_string(),
                device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
                extensions: vec!["VK_KHR_swapchain".to_string()],
                queue_families: vec![
                    QueueFamilyInfo {
                        index: 0,
                        flags: vk::QueueFlags::TRANSFER,
                    },
                    QueueFamilyInfo {
                        index: 1,
                        flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
                    },
                ],
            }],
            present_support: true,
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 8192,
                    height: 8192,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fences_stall: false,
            stalled_fences: HashSet::new(),
            fail_record: false,
            fail_submit: false,
            fail_create: None,
            last_instance: None,
            live: HashSet::new(),
            signalled: HashSet::new(),
            unsubmitted_fences: HashSet::new(),
            next_handle: 1,
            next_image: 0,
            image_count: 0,
            instance_id: 0,
            device_id: 0,
        }
    }

    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    /// Semaphores signalled by an acquire or submission that nothing has
    /// waited on yet.
    pub fn signalled_semaphores(&self) -> usize {
        self.signalled.len()
    }

    pub fn created(&self) -> Vec<(Kind, u64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Create(kind, id) => Some((*kind, *id)),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<(Kind, u64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Destroy(kind, id) => Some((*kind, *id)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    fn create(&mut self, kind: Kind) -> Result<u64, RendererError> {
        if self.fail_create == Some(kind) {
            self.fail_create = None;
            return Err(RendererError::Vulkan {
                op: "mock create",
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            });
        }
        let id = self.next_handle;
        self.next_handle += 1;
        self.live.insert((kind, id));
        self.calls.push(Call::Create(kind, id));
        Ok(id)
    }

    fn destroy(&mut self, kind: Kind, id: u64) {
        assert!(self.live.remove(&(kind, id)), "{kind:?} {id} destroyed while not alive");
        self.signalled.remove(&id);
        self.unsubmitted_fences.remove(&id);
        self.calls.push(Call::Destroy(kind, id));
    }
}

impl VulkanApi for MockApi {
    fn instance_extensions(&self) -> Result<Vec<String>, RendererError> {
        Ok(self.extensions.clone())
    }

    fn instance_layers(&self) -> Result<Vec<String>, RendererError> {
        Ok(self.layers.clone())
    }

    fn create_instance(&mut self, desc: &InstanceDesc<'_>) -> Result<(), RendererError> {
        let names = |list: &[&CStr]| list.iter().map(|n| n.to_string_lossy().into_owned()).collect::<Vec<_>>();
        self.last_instance = Some((names(desc.extensions), names(desc.layers), desc.debug_messenger));
        self.instance_id = self.create(Kind::Instance)?;
        Ok(())
    }

    fn destroy_instance(&mut self) {
        self.destroy(Kind::Instance, self.instance_id);
    }

    fn create_debug_messenger(&mut self) -> Result<vk::DebugUtilsMessengerEXT, RendererError> {
        self.create(Kind::DebugMessenger).map(vk::DebugUtilsMessengerEXT::from_raw)
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        self.destroy(Kind::DebugMessenger, messenger.as_raw());
    }

    fn create_surface(&mut self, _: RawDisplayHandle, _: RawWindowHandle) -> Result<vk::SurfaceKHR, RendererError> {
        self.create(Kind::Surface).map(vk::SurfaceKHR::from_raw)
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        self.destroy(Kind::Surface, surface.as_raw());
    }

    fn physical_devices(&self) -> Result<Vec<PhysicalDeviceInfo>, RendererError> {
        Ok(self.devices.clone())
    }

    fn supports_present(&self, _: vk::PhysicalDevice, _: u32, _: vk::SurfaceKHR) -> Result<bool, RendererError> {
        Ok(self.present_support)
    }

    fn create_device(&mut self, _: vk::PhysicalDevice, _: u32, _: &[&'static CStr]) -> Result<(), RendererError> {
        self.device_id = self.create(Kind::Device)?;
        Ok(())
    }

    fn destroy_device(&mut self) {
        self.destroy(Kind::Device, self.device_id);
    }

    fn create_command_pool(&mut self, _: u32) -> Result<vk::CommandPool, RendererError> {
        self.create(Kind::CommandPool).map(vk::CommandPool::from_raw)
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        self.destroy(Kind::CommandPool, pool.as_raw());
    }

    fn surface_capabilities(
        &self,
        _: vk::PhysicalDevice,
        _: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR, RendererError> {
        Ok(self.capabilities)
    }

    fn surface_formats(&self, _: vk::PhysicalDevice, _: vk::SurfaceKHR) -> Result<Vec<vk::SurfaceFormatKHR>, RendererError> {
        Ok(self.formats.clone())
    }

    fn surface_present_modes(
        &self,
        _: vk::PhysicalDevice,
        _: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>, RendererError> {
        Ok(self.present_modes.clone())
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR, RendererError> {
        let id = self.create(Kind::Swapchain)?;
        self.image_count = desc.min_image_count;
        self.next_image = 0;
        Ok(vk::SwapchainKHR::from_raw(id))
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.destroy(Kind::Swapchain, swapchain.as_raw());
    }

    fn swapchain_images(&self, _: vk::SwapchainKHR) -> Result<Vec<vk::Image>, RendererError> {
        Ok((0..self.image_count).map(|i| vk::Image::from_raw(10_000 + u64::from(i))).collect())
    }

    fn create_render_pass(&mut self, _: vk::Format) -> Result<vk::RenderPass, RendererError> {
        self.create(Kind::RenderPass).map(vk::RenderPass::from_raw)
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.destroy(Kind::RenderPass, render_pass.as_raw());
    }

    fn create_image_view(&mut self, _: vk::Image, _: vk::Format) -> Result<vk::ImageView, RendererError> {
        self.create(Kind::ImageView).map(vk::ImageView::from_raw)
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.destroy(Kind::ImageView, view.as_raw());
    }

    fn create_framebuffer(
        &mut self,
        _: vk::RenderPass,
        _: vk::ImageView,
        _: vk::Extent2D,
    ) -> Result<vk::Framebuffer, RendererError> {
        self.create(Kind::Framebuffer).map(vk::Framebuffer::from_raw)
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        self.destroy(Kind::Framebuffer, framebuffer.as_raw());
    }

    fn allocate_command_buffer(&mut self, _: vk::CommandPool) -> Result<vk::CommandBuffer, RendererError> {
        self.create(Kind::CommandBuffer).map(vk::CommandBuffer::from_raw)
    }

    fn free_command_buffer(&mut self, _: vk::CommandPool, command_buffer: vk::CommandBuffer) {
        self.destroy(Kind::CommandBuffer, command_buffer.as_raw());
    }

    fn create_semaphore(&mut self) -> Result<vk::Semaphore, RendererError> {
        self.create(Kind::Semaphore).map(vk::Semaphore::from_raw)
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        self.destroy(Kind::Semaphore, semaphore.as_raw());
    }

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence, RendererError> {
        let id = self.create(Kind::Fence)?;
        if !signaled {
            self.unsubmitted_fences.insert(id);
        }
        Ok(vk::Fence::from_raw(id))
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        self.destroy(Kind::Fence, fence.as_raw());
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout: u64) -> Result<bool, RendererError> {
        let id = fence.as_raw();
        self.calls.push(Call::WaitFence(id));
        let stalled = self.fences_stall || self.stalled_fences.contains(&id) || self.unsubmitted_fences.contains(&id);
        assert!(
            !(stalled && timeout == u64::MAX),
            "fence {id} can never signal, an unbounded wait would hang"
        );
        Ok(!stalled)
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<(), RendererError> {
        self.calls.push(Call::ResetFence(fence.as_raw()));
        self.unsubmitted_fences.insert(fence.as_raw());
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        _: vk::SwapchainKHR,
        _: u64,
        signal: vk::Semaphore,
    ) -> Result<AcquireOutcome, RendererError> {
        self.calls.push(Call::Acquire {
            semaphore: signal.as_raw(),
        });
        let outcome = self.acquire_script.pop_front().unwrap_or_else(|| {
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count.max(1);
            AcquireOutcome::Acquired {
                image_index,
                suboptimal: false,
            }
        });
        if let AcquireOutcome::Acquired { .. } = outcome {
            assert!(
                self.signalled.insert(signal.as_raw()),
                "semaphore {} acquired into while its previous signal is pending",
                signal.as_raw()
            );
        }
        Ok(outcome)
    }

    fn record_clear_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        _: vk::RenderPass,
        _: vk::Framebuffer,
        _: vk::Extent2D,
        _: [f32; 4],
    ) -> Result<(), RendererError> {
        self.calls.push(Call::Record {
            command_buffer: command_buffer.as_raw(),
        });
        if std::mem::take(&mut self.fail_record) {
            return Err(RendererError::Vulkan {
                op: "mock record",
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            });
        }
        Ok(())
    }

    fn submit(
        &mut self,
        _: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<(), RendererError> {
        self.calls.push(Call::Submit {
            wait: wait.as_raw(),
            signal: signal.as_raw(),
            fence: fence.as_raw(),
        });
        if std::mem::take(&mut self.fail_submit) {
            return Err(RendererError::Vulkan {
                op: "mock submit",
                result: vk::Result::ERROR_DEVICE_LOST,
            });
        }
        assert!(
            self.signalled.remove(&wait.as_raw()),
            "submission waits on unsignalled semaphore {}",
            wait.as_raw()
        );
        assert!(self.signalled.insert(signal.as_raw()), "semaphore {} signalled twice", signal.as_raw());
        self.unsubmitted_fences.remove(&fence.as_raw());
        Ok(())
    }

    fn present(&mut self, _: vk::SwapchainKHR, image_index: u32, wait: vk::Semaphore) -> Result<PresentOutcome, RendererError> {
        self.calls.push(Call::Present {
            image_index,
            wait: wait.as_raw(),
        });
        assert!(
            self.signalled.remove(&wait.as_raw()),
            "present waits on unsignalled semaphore {}",
            wait.as_raw()
        );
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn device_wait_idle(&mut self) -> Result<(), RendererError> {
        self.calls.push(Call::WaitIdle);
        Ok(())
    }
}
