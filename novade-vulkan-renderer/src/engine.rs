//! The presentation engine: GPU context setup, swapchain lifecycle and the
//! per-frame acquire, record, submit and present protocol.

use std::ffi::CStr;
use std::time::Duration;

use ash::extensions::{ext::DebugUtils, khr};
use ash::vk;
use novade_core::config::RendererConfig;
use novade_core::Extent;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info, warn};

use crate::api::{AcquireOutcome, InstanceDesc, PresentOutcome, SwapchainDesc, VulkanApi};
use crate::ash_api::AshApi;
use crate::device_selection::{select_device, select_queue_family};
use crate::error::RendererError;
use crate::frame::FrameCursor;
use crate::swapchain::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format, Swapchain};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance extensions the engine cannot run without. Debug utils is only
/// required while validation is on.
pub fn required_instance_extensions(enable_validation: bool) -> Vec<&'static CStr> {
    let mut extensions = vec![khr::Surface::name(), khr::WaylandSurface::name()];
    if enable_validation {
        extensions.push(DebugUtils::name());
    }
    extensions
}

pub fn required_instance_layers(enable_validation: bool) -> Vec<&'static CStr> {
    if enable_validation {
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    }
}

pub fn required_device_extensions() -> [&'static CStr; 1] {
    [khr::Swapchain::name()]
}

/// Maps a configured present mode name. Unknown names fall back to FIFO.
pub fn present_mode_from_name(name: &str) -> vk::PresentModeKHR {
    match name {
        "mailbox" => vk::PresentModeKHR::MAILBOX,
        "immediate" => vk::PresentModeKHR::IMMEDIATE,
        _ => vk::PresentModeKHR::FIFO,
    }
}

fn ensure_available(
    required: &[&'static CStr],
    available: &[String],
    missing: fn(String) -> RendererError,
) -> Result<(), RendererError> {
    for name in required {
        let name = name.to_string_lossy();
        if !available.iter().any(|candidate| *candidate == name) {
            return Err(missing(name.into_owned()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub application_name: String,
    pub engine_name: String,
    pub enable_validation: bool,
    pub present_mode: vk::PresentModeKHR,
    pub clear_color: [f32; 4],
    /// Bound on every fence and acquire wait. `None` waits forever.
    pub frame_timeout: Option<Duration>,
    /// Size used when the surface leaves the swapchain extent to the client.
    pub initial_extent: Extent,
}

impl EngineSettings {
    pub fn from_config(config: &RendererConfig, initial_extent: Extent) -> Self {
        Self {
            application_name: config.application_name.clone(),
            engine_name: config.engine_name.clone(),
            enable_validation: config.enable_validation,
            present_mode: present_mode_from_name(&config.present_mode),
            clear_color: config.clear_color,
            frame_timeout: config.frame_timeout(),
            initial_extent,
        }
    }

    fn timeout_ns(&self) -> u64 {
        self.frame_timeout
            .map_or(u64::MAX, |timeout| u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX))
    }

    fn timeout_ms(&self) -> u64 {
        self.frame_timeout
            .map_or(u64::MAX, |timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&RendererConfig::default(), Extent::new(1280, 720))
    }
}

/// What a call to [`PresentationEngine::render_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { image_index: u32 },
    /// The swapchain went stale and was rebuilt; nothing more to do this frame.
    Recreated,
}

/// How far [`PresentationEngine::draw`] got.
#[derive(Debug)]
enum Draw {
    Presented(u32),
    /// The swapchain must be rebuilt. `presented` is set when the frame was
    /// submitted and handed to presentation before it went stale.
    Stale { presented: bool },
    /// Failed after an image was acquired. The slot's acquire semaphore
    /// holds a signal nothing will wait on, so its objects cannot be reused.
    Abandoned(RendererError),
}

/// Context-level objects, recorded in creation order so teardown and
/// failed setup both release exactly what exists, in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextObject {
    Instance,
    DebugMessenger(vk::DebugUtilsMessengerEXT),
    Surface(vk::SurfaceKHR),
    Device,
    CommandPool(vk::CommandPool),
}

fn record(created: &mut Vec<ContextObject>, object: ContextObject) {
    debug!(?object, "Created");
    created.push(object);
}

fn unwind<A: VulkanApi>(api: &mut A, created: &mut Vec<ContextObject>) {
    while let Some(object) = created.pop() {
        debug!(?object, "Destroying");
        match object {
            ContextObject::CommandPool(pool) => api.destroy_command_pool(pool),
            ContextObject::Device => api.destroy_device(),
            ContextObject::Surface(surface) => api.destroy_surface(surface),
            ContextObject::DebugMessenger(messenger) => api.destroy_debug_messenger(messenger),
            ContextObject::Instance => api.destroy_instance(),
        }
    }
}

#[derive(Debug)]
struct GpuContext {
    created: Vec<ContextObject>,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device_name: String,
    queue_family: u32,
    command_pool: vk::CommandPool,
}

/// Owns every Vulkan object behind one window.
///
/// Lifecycle: [`connect`](Self::connect) builds the GPU context and the
/// first swapchain, [`render_frame`](Self::render_frame) runs one frame,
/// [`disconnect`](Self::disconnect) (or drop) releases everything in
/// reverse creation order.
pub struct PresentationEngine<A: VulkanApi = AshApi> {
    api: A,
    settings: EngineSettings,
    context: Option<GpuContext>,
    swapchain: Option<Swapchain>,
    cursor: FrameCursor,
    window_extent: Extent,
}

impl PresentationEngine<AshApi> {
    /// Opens the system Vulkan loader. No Vulkan object exists until
    /// [`connect`](Self::connect).
    pub fn load(settings: EngineSettings) -> Result<Self, RendererError> {
        Ok(Self::new(AshApi::load()?, settings))
    }
}

impl<A: VulkanApi> PresentationEngine<A> {
    pub fn new(api: A, settings: EngineSettings) -> Self {
        let window_extent = settings.initial_extent;
        Self {
            api,
            settings,
            context: None,
            swapchain: None,
            cursor: FrameCursor::default(),
            window_extent,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    #[cfg(test)]
    pub(crate) fn api_mut(&mut self) -> &mut A {
        &mut self.api
    }

    pub fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    pub fn frame_cursor(&self) -> FrameCursor {
        self.cursor
    }

    /// Name of the selected physical device.
    pub fn device_name(&self) -> Option<&str> {
        self.context.as_ref().map(|context| context.device_name.as_str())
    }

    /// Builds the instance, surface, device, command pool and first
    /// swapchain for the window behind `display` and `window`.
    ///
    /// On failure nothing stays alive.
    pub fn connect(&mut self, display: RawDisplayHandle, window: RawWindowHandle) -> Result<(), RendererError> {
        if self.context.is_some() {
            return Err(RendererError::AlreadyConnected);
        }

        let mut created = Vec::new();
        let context = match self.open_context(&mut created, display, window) {
            Ok(context) => context,
            Err(err) => {
                unwind(&mut self.api, &mut created);
                return Err(err);
            }
        };
        info!(device = %context.device_name, queue_family = context.queue_family, "GPU context ready");
        self.context = Some(context);

        if let Err(err) = self.start_swapchain() {
            self.disconnect();
            return Err(err);
        }
        Ok(())
    }

    fn open_context(
        &mut self,
        created: &mut Vec<ContextObject>,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<GpuContext, RendererError> {
        let validation = self.settings.enable_validation;
        let extensions = required_instance_extensions(validation);
        let layers = required_instance_layers(validation);
        ensure_available(&extensions, &self.api.instance_extensions()?, RendererError::MissingExtension)?;
        ensure_available(&layers, &self.api.instance_layers()?, RendererError::MissingLayer)?;

        self.api.create_instance(&InstanceDesc {
            application_name: &self.settings.application_name,
            engine_name: &self.settings.engine_name,
            extensions: &extensions,
            layers: &layers,
            debug_messenger: validation,
        })?;
        record(created, ContextObject::Instance);

        if validation {
            let messenger = self.api.create_debug_messenger()?;
            record(created, ContextObject::DebugMessenger(messenger));
        }

        let surface = self.api.create_surface(display, window)?;
        record(created, ContextObject::Surface(surface));

        let device_extensions = required_device_extensions();
        let candidates = self.api.physical_devices()?;
        let device = select_device(&candidates, &device_extensions).ok_or(RendererError::NoSuitableDevice)?;
        debug!(device = %device.name, device_type = ?device.device_type, "Selected physical device");

        let api = &self.api;
        let queue_family = select_queue_family(&device.queue_families, |index| {
            api.supports_present(device.handle, index, surface)
        })?
        .ok_or_else(|| RendererError::NoPresentQueue {
            device: device.name.clone(),
        })?;

        self.api.create_device(device.handle, queue_family, &device_extensions)?;
        record(created, ContextObject::Device);

        let command_pool = self.api.create_command_pool(queue_family)?;
        record(created, ContextObject::CommandPool(command_pool));

        Ok(GpuContext {
            created: std::mem::take(created),
            surface,
            physical_device: device.handle,
            device_name: device.name.clone(),
            queue_family,
            command_pool,
        })
    }

    /// Creates a swapchain generation for the current window size. A
    /// running generation is torn down first.
    pub fn start_swapchain(&mut self) -> Result<(), RendererError> {
        let context = self.context.as_ref().ok_or(RendererError::NotConnected)?;
        let (physical_device, surface, command_pool) =
            (context.physical_device, context.surface, context.command_pool);
        if self.swapchain.is_some() {
            self.wait_for_idle()?;
            self.end_swapchain();
        }

        let capabilities = self.api.surface_capabilities(physical_device, surface)?;
        let formats = self.api.surface_formats(physical_device, surface)?;
        let format = choose_surface_format(&formats).ok_or(RendererError::Enumeration {
            what: "surface formats",
            result: vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
        })?;
        let present_modes = self.api.surface_present_modes(physical_device, surface)?;

        let desc = SwapchainDesc {
            surface,
            min_image_count: choose_image_count(&capabilities),
            format,
            extent: choose_extent(&capabilities, self.window_extent),
            pre_transform: capabilities.current_transform,
            present_mode: choose_present_mode(self.settings.present_mode, &present_modes),
        };
        let swapchain = Swapchain::create(&mut self.api, &desc, command_pool)?;
        info!(
            images = swapchain.image_count(),
            width = swapchain.extent.width,
            height = swapchain.extent.height,
            format = ?swapchain.format.format,
            present_mode = ?swapchain.present_mode,
            "Swapchain started"
        );
        self.swapchain = Some(swapchain);
        self.cursor.reset();
        Ok(())
    }

    /// Releases the running swapchain generation and resets the frame
    /// cursor. The device must be idle.
    pub fn end_swapchain(&mut self) {
        if let (Some(swapchain), Some(context)) = (self.swapchain.take(), self.context.as_ref()) {
            swapchain.destroy(&mut self.api, context.command_pool);
            debug!("Swapchain ended");
        }
        self.cursor.reset();
    }

    fn recreate_swapchain(&mut self) -> Result<(), RendererError> {
        self.wait_for_idle()?;
        self.end_swapchain();
        self.start_swapchain()
    }

    /// Rebuilds the swapchain for a new window size.
    pub fn resize(&mut self, extent: Extent) -> Result<(), RendererError> {
        self.window_extent = extent;
        if self.context.is_none() {
            return Ok(());
        }
        info!(%extent, "Resizing swapchain");
        self.recreate_swapchain()
    }

    pub fn wait_for_idle(&mut self) -> Result<(), RendererError> {
        if self.context.is_some() {
            self.api.device_wait_idle()?;
        }
        Ok(())
    }

    /// Runs one frame. A stale swapchain, reported by acquire or present,
    /// is rebuilt and reported as [`FrameOutcome::Recreated`].
    ///
    /// A failure after an image was acquired also rebuilds the swapchain
    /// before the error is returned, so the next frame starts from fresh
    /// semaphores and fences.
    pub fn render_frame(&mut self) -> Result<FrameOutcome, RendererError> {
        match self.draw()? {
            Draw::Presented(image_index) => Ok(FrameOutcome::Presented { image_index }),
            Draw::Stale { presented } => {
                debug!(presented, "Swapchain out of date, recreating");
                self.recreate_swapchain()?;
                // A presented frame still moves the cursor, onto the new generation.
                if presented {
                    let image_count = self.swapchain.as_ref().map_or(0, Swapchain::image_count);
                    self.cursor.advance(image_count);
                }
                Ok(FrameOutcome::Recreated)
            }
            Draw::Abandoned(err) => {
                warn!("Frame abandoned after image acquisition, recreating swapchain: {err}");
                self.recreate_swapchain()?;
                Err(err)
            }
        }
    }

    /// Errors returned directly leave every frame object reusable. Once an
    /// image is acquired, failures come back as [`Draw::Abandoned`].
    fn draw(&mut self) -> Result<Draw, RendererError> {
        let timeout_ns = self.settings.timeout_ns();
        let timeout_ms = self.settings.timeout_ms();
        let clear_color = self.settings.clear_color;
        let Self {
            api, swapchain, cursor, ..
        } = self;
        let swapchain = swapchain.as_mut().ok_or(RendererError::NoSwapchain)?;
        let image_count = swapchain.image_count();
        let slot = swapchain
            .elements
            .get(cursor.frame_slot())
            .copied()
            .ok_or(RendererError::NoSwapchain)?;

        if !api.wait_for_fence(slot.fence, timeout_ns)? {
            return Err(RendererError::FrameStall {
                op: "frame fence wait",
                timeout_ms,
            });
        }

        let image_index = match api.acquire_next_image(swapchain.handle, timeout_ns, slot.acquire_semaphore)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal: false,
            } => image_index,
            AcquireOutcome::Acquired { suboptimal: true, .. } | AcquireOutcome::OutOfDate => {
                return Ok(Draw::Stale { presented: false })
            }
            AcquireOutcome::Timeout => {
                return Err(RendererError::FrameStall {
                    op: "image acquisition",
                    timeout_ms,
                })
            }
        };
        cursor.set_image_index(image_index);

        let Some(element) = swapchain.elements.get_mut(image_index as usize) else {
            return Ok(Draw::Abandoned(RendererError::Vulkan {
                op: "vkAcquireNextImageKHR",
                result: vk::Result::ERROR_UNKNOWN,
            }));
        };
        // The image may still be in flight from a submission made under
        // another slot's fence.
        if let Some(last_fence) = element.last_fence.filter(|fence| *fence != slot.fence) {
            match api.wait_for_fence(last_fence, timeout_ns) {
                Ok(true) => {}
                Ok(false) => {
                    return Ok(Draw::Abandoned(RendererError::FrameStall {
                        op: "image fence wait",
                        timeout_ms,
                    }))
                }
                Err(err) => return Ok(Draw::Abandoned(err)),
            }
        }
        let (command_buffer, framebuffer) = (element.command_buffer, element.framebuffer);

        if let Err(err) = api.record_clear_pass(
            command_buffer,
            swapchain.render_pass,
            framebuffer,
            swapchain.extent,
            clear_color,
        ) {
            return Ok(Draw::Abandoned(err));
        }
        // Reset only once a submission is certain to follow, or the next
        // wait on this slot never returns.
        let submitted = api
            .reset_fence(slot.fence)
            .and_then(|()| api.submit(command_buffer, slot.acquire_semaphore, slot.release_semaphore, slot.fence));
        if let Err(err) = submitted {
            return Ok(Draw::Abandoned(err));
        }
        element.last_fence = Some(slot.fence);

        match api.present(swapchain.handle, image_index, slot.release_semaphore) {
            Ok(PresentOutcome::Presented) => {
                cursor.advance(image_count);
                Ok(Draw::Presented(image_index))
            }
            Ok(PresentOutcome::Suboptimal | PresentOutcome::OutOfDate) => Ok(Draw::Stale { presented: true }),
            Err(err) => Ok(Draw::Abandoned(err)),
        }
    }

    /// Waits for the GPU, then releases every object in reverse creation
    /// order. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if self.context.is_none() {
            return;
        }
        if let Err(err) = self.api.device_wait_idle() {
            warn!("Device wait before teardown failed: {err}");
        }
        self.end_swapchain();
        if let Some(mut context) = self.context.take() {
            unwind(&mut self.api, &mut context.created);
            info!("Presentation engine disconnected");
        }
    }
}

impl<A: VulkanApi> Drop for PresentationEngine<A> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, Kind, MockApi};
    use ash::vk::Handle;
    use pretty_assertions::assert_eq;
    use raw_window_handle::{WaylandDisplayHandle, WaylandWindowHandle};
    use rstest::rstest;
    use std::ptr::NonNull;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn settings(enable_validation: bool) -> EngineSettings {
        EngineSettings {
            application_name: "SimpleWindow".into(),
            engine_name: "Iridium".into(),
            enable_validation,
            present_mode: vk::PresentModeKHR::MAILBOX,
            clear_color: [1.0, 0.0, 1.0, 1.0],
            frame_timeout: None,
            initial_extent: Extent::new(1280, 720),
        }
    }

    fn handles() -> (RawDisplayHandle, RawWindowHandle) {
        (
            RawDisplayHandle::Wayland(WaylandDisplayHandle::new(NonNull::dangling())),
            RawWindowHandle::Wayland(WaylandWindowHandle::new(NonNull::dangling())),
        )
    }

    fn connected(api: MockApi) -> PresentationEngine<MockApi> {
        connected_with(api, settings(true))
    }

    fn connected_with(api: MockApi, settings: EngineSettings) -> PresentationEngine<MockApi> {
        init_logging();
        let mut engine = PresentationEngine::new(api, settings);
        let (display, window) = handles();
        engine.connect(display, window).expect("connect");
        engine
    }

    fn bounded() -> EngineSettings {
        EngineSettings {
            frame_timeout: Some(Duration::from_millis(100)),
            ..settings(true)
        }
    }

    fn element_handles(engine: &PresentationEngine<MockApi>, index: usize) -> (u64, u64, u64) {
        let element = engine.swapchain().expect("swapchain").elements[index];
        (
            element.acquire_semaphore.as_raw(),
            element.release_semaphore.as_raw(),
            element.fence.as_raw(),
        )
    }

    #[test]
    fn connect_builds_context_then_swapchain() {
        let engine = connected(MockApi::new());
        let kinds: Vec<Kind> = engine.api().created().into_iter().map(|(kind, _)| kind).collect();

        let mut expected = vec![
            Kind::Instance,
            Kind::DebugMessenger,
            Kind::Surface,
            Kind::Device,
            Kind::CommandPool,
            Kind::Swapchain,
            Kind::RenderPass,
        ];
        for _ in 0..3 {
            expected.extend([
                Kind::CommandBuffer,
                Kind::ImageView,
                Kind::Framebuffer,
                Kind::Semaphore,
                Kind::Semaphore,
                Kind::Fence,
            ]);
        }
        assert_eq!(kinds, expected);

        let swapchain = engine.swapchain().expect("swapchain");
        assert_eq!(swapchain.image_count(), 3);
        assert_eq!(swapchain.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(swapchain.extent, vk::Extent2D { width: 1280, height: 720 });
        assert!(swapchain.elements.iter().all(|element| element.last_fence.is_none()));
        assert_eq!(engine.device_name(), Some("Mock Discrete"));
        assert_eq!(engine.frame_cursor(), FrameCursor::default());
    }

    #[test]
    fn instance_requests_wayland_surface_and_validation() {
        let engine = connected(MockApi::new());
        let (extensions, layers, debug) = engine.api().last_instance.clone().expect("instance");
        assert_eq!(
            extensions,
            vec!["VK_KHR_surface", "VK_KHR_wayland_surface", "VK_EXT_debug_utils"]
        );
        assert_eq!(layers, vec!["VK_LAYER_KHRONOS_validation"]);
        assert!(debug);
    }

    #[test]
    fn disconnect_releases_in_exact_reverse_order() {
        let mut engine = connected(MockApi::new());
        engine.render_frame().expect("frame");
        engine.render_frame().expect("frame");
        engine.disconnect();

        let api = engine.api();
        let mut created = api.created();
        created.reverse();
        assert_eq!(api.destroyed(), created);
        assert_eq!(api.live_objects(), 0);
        assert!(!engine.is_connected());

        let first_destroy = api
            .calls
            .iter()
            .position(|call| matches!(call, Call::Destroy(..)))
            .expect("destroy");
        assert_eq!(api.calls[first_destroy - 1], Call::WaitIdle);
    }

    #[test]
    fn disconnect_is_idempotent_and_drop_is_safe() {
        let mut engine = connected(MockApi::new());
        engine.disconnect();
        let calls = engine.api().calls.len();
        engine.disconnect();
        assert_eq!(engine.api().calls.len(), calls);
        drop(engine);
    }

    #[test]
    fn frame_slot_is_frame_count_modulo_image_count() {
        let mut engine = connected(MockApi::new());
        for frame in 0..7 {
            assert_eq!(engine.frame_cursor().frame_slot(), frame % 3);
            assert_eq!(
                engine.render_frame().expect("frame"),
                FrameOutcome::Presented {
                    image_index: (frame % 3) as u32
                }
            );
        }
        assert_eq!(engine.frame_cursor().frame_slot(), 7 % 3);
    }

    #[test]
    fn frame_uses_the_slot_semaphores_and_fence() {
        let mut engine = connected(MockApi::new());
        let (acquire, release, fence) = element_handles(&engine, 0);
        let before = engine.api().calls.len();
        engine.render_frame().expect("frame");

        let command_buffer = engine.swapchain().expect("swapchain").elements[0]
            .command_buffer
            .as_raw();
        assert_eq!(
            engine.api().calls[before..].to_vec(),
            vec![
                Call::WaitFence(fence),
                Call::Acquire { semaphore: acquire },
                Call::Record { command_buffer },
                Call::ResetFence(fence),
                Call::Submit {
                    wait: acquire,
                    signal: release,
                    fence
                },
                Call::Present {
                    image_index: 0,
                    wait: release
                },
            ]
        );
        assert_eq!(
            engine.swapchain().expect("swapchain").elements[0].last_fence,
            Some(vk::Fence::from_raw(fence))
        );
    }

    #[test]
    fn image_reused_under_another_slot_waits_for_its_last_fence() {
        let mut api = MockApi::new();
        let image_zero = AcquireOutcome::Acquired {
            image_index: 0,
            suboptimal: false,
        };
        api.acquire_script.extend([image_zero, image_zero]);
        let mut engine = connected(api);
        let (_, _, fence0) = element_handles(&engine, 0);
        let (_, _, fence1) = element_handles(&engine, 1);

        engine.render_frame().expect("first frame");
        let before = engine.api().calls.len();
        engine.render_frame().expect("second frame");

        let waits: Vec<Call> = engine.api().calls[before..]
            .iter()
            .filter(|call| matches!(call, Call::WaitFence(_) | Call::ResetFence(_)))
            .cloned()
            .collect();
        assert_eq!(
            waits,
            vec![Call::WaitFence(fence1), Call::WaitFence(fence0), Call::ResetFence(fence1)]
        );
        assert_eq!(
            engine.swapchain().expect("swapchain").elements[0].last_fence,
            Some(vk::Fence::from_raw(fence1))
        );
    }

    #[test]
    fn image_reused_under_the_same_slot_waits_once() {
        let mut engine = connected(MockApi::new());
        for _ in 0..4 {
            engine.render_frame().expect("frame");
        }
        let waits = engine.api().count(|call| matches!(call, Call::WaitFence(_)));
        assert_eq!(waits, 4);
    }

    #[test]
    fn out_of_date_acquire_rebuilds_without_submitting() {
        let mut engine = connected(MockApi::new());
        engine.render_frame().expect("frame");
        engine.render_frame().expect("frame");
        let old = engine.swapchain().expect("swapchain").handle;

        engine.api_mut().acquire_script.push_back(AcquireOutcome::OutOfDate);
        let submits = engine.api().count(|call| matches!(call, Call::Submit { .. }));
        assert_eq!(engine.render_frame().expect("frame"), FrameOutcome::Recreated);
        assert_eq!(
            engine.api().count(|call| matches!(call, Call::Submit { .. })),
            submits
        );

        let new = engine.swapchain().expect("swapchain").handle;
        assert_ne!(old, new);
        assert_eq!(engine.frame_cursor(), FrameCursor::default());
        assert!(engine
            .api()
            .destroyed()
            .contains(&(Kind::Swapchain, old.as_raw())));
    }

    #[test]
    fn first_frame_out_of_date_is_recreated() {
        let mut api = MockApi::new();
        api.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut engine = connected(api);
        let old = engine.swapchain().expect("swapchain").handle;

        assert_eq!(engine.render_frame().expect("frame"), FrameOutcome::Recreated);
        assert_ne!(engine.swapchain().expect("swapchain").handle, old);
        assert_eq!(engine.api().count(|call| matches!(call, Call::Submit { .. })), 0);
        assert_eq!(engine.api().count(|call| *call == Call::WaitIdle), 1);
    }

    #[test]
    fn suboptimal_acquire_is_recreated() {
        let mut api = MockApi::new();
        api.acquire_script.push_back(AcquireOutcome::Acquired {
            image_index: 0,
            suboptimal: true,
        });
        let mut engine = connected(api);
        assert_eq!(engine.render_frame().expect("frame"), FrameOutcome::Recreated);
    }

    #[test]
    fn out_of_date_present_is_recreated_after_submit() {
        let mut api = MockApi::new();
        api.present_script.push_back(PresentOutcome::OutOfDate);
        let mut engine = connected(api);
        let old = engine.swapchain().expect("swapchain").handle;

        assert_eq!(engine.render_frame().expect("frame"), FrameOutcome::Recreated);
        assert_eq!(engine.api().count(|call| matches!(call, Call::Submit { .. })), 1);
        assert_ne!(engine.swapchain().expect("swapchain").handle, old);
        assert_eq!(engine.frame_cursor().frame_slot(), 1);

        let (acquire, _, _) = element_handles(&engine, 1);
        let before = engine.api().calls.len();
        assert_eq!(
            engine.render_frame().expect("frame"),
            FrameOutcome::Presented { image_index: 0 }
        );
        assert!(engine.api().calls[before..].contains(&Call::Acquire { semaphore: acquire }));
        assert_eq!(engine.frame_cursor().frame_slot(), 2);
    }

    #[test]
    fn stale_acquire_restarts_at_the_first_slot() {
        let mut engine = connected(MockApi::new());
        engine.render_frame().expect("frame");
        engine.api_mut().acquire_script.push_back(AcquireOutcome::Acquired {
            image_index: 1,
            suboptimal: true,
        });
        assert_eq!(engine.render_frame().expect("frame"), FrameOutcome::Recreated);
        assert_eq!(engine.frame_cursor(), FrameCursor::default());
        assert_eq!(engine.api().signalled_semaphores(), 0);
    }

    #[test]
    fn missing_instance_extension_creates_nothing() {
        let mut api = MockApi::new();
        api.extensions.retain(|name| name != "VK_KHR_wayland_surface");
        let mut engine = PresentationEngine::new(api, settings(false));
        let (display, window) = handles();

        let err = engine.connect(display, window).expect_err("must fail");
        assert!(matches!(err, RendererError::MissingExtension(ref name) if name == "VK_KHR_wayland_surface"));
        assert!(engine.api().calls.is_empty());
        assert!(!engine.is_connected());
    }

    #[test]
    fn missing_validation_layer_only_matters_with_validation() {
        let mut api = MockApi::new();
        api.layers.clear();
        let mut engine = PresentationEngine::new(api, settings(true));
        let (display, window) = handles();
        assert!(matches!(
            engine.connect(display, window),
            Err(RendererError::MissingLayer(_))
        ));

        let mut api = MockApi::new();
        api.layers.clear();
        api.extensions.retain(|name| name != "VK_EXT_debug_utils");
        let mut engine = PresentationEngine::new(api, settings(false));
        engine.connect(display, window).expect("connect without validation");
        let (extensions, layers, debug) = engine.api().last_instance.clone().expect("instance");
        assert_eq!(extensions, vec!["VK_KHR_surface", "VK_KHR_wayland_surface"]);
        assert!(layers.is_empty());
        assert!(!debug);
        assert!(!engine
            .api()
            .created()
            .iter()
            .any(|(kind, _)| *kind == Kind::DebugMessenger));
    }

    #[test]
    fn no_suitable_device_unwinds_the_instance() {
        let mut api = MockApi::new();
        api.devices[0].extensions.clear();
        let mut engine = PresentationEngine::new(api, settings(true));
        let (display, window) = handles();

        assert!(matches!(
            engine.connect(display, window),
            Err(RendererError::NoSuitableDevice)
        ));
        let api = engine.api();
        let mut created = api.created();
        created.reverse();
        assert_eq!(api.destroyed(), created);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn no_present_queue_unwinds() {
        let mut api = MockApi::new();
        api.present_support = false;
        let mut engine = PresentationEngine::new(api, settings(false));
        let (display, window) = handles();

        assert!(matches!(
            engine.connect(display, window),
            Err(RendererError::NoPresentQueue { .. })
        ));
        assert_eq!(engine.api().live_objects(), 0);
    }

    #[test]
    fn failed_swapchain_setup_leaves_nothing_alive() {
        let mut api = MockApi::new();
        api.fail_create = Some(Kind::Fence);
        let mut engine = PresentationEngine::new(api, settings(true));
        let (display, window) = handles();

        assert!(engine.connect(display, window).is_err());
        assert_eq!(engine.api().live_objects(), 0);
        assert!(!engine.is_connected());
        assert!(engine.swapchain().is_none());
    }

    #[test]
    fn second_connect_is_rejected() {
        let mut engine = connected(MockApi::new());
        let (display, window) = handles();
        assert!(matches!(
            engine.connect(display, window),
            Err(RendererError::AlreadyConnected)
        ));
    }

    #[test]
    fn stalled_fence_is_reported() {
        let mut engine = connected_with(MockApi::new(), bounded());
        engine.api_mut().fences_stall = true;
        let calls = engine.api().calls.len();
        assert!(matches!(
            engine.render_frame(),
            Err(RendererError::FrameStall { op: "frame fence wait", .. })
        ));
        // Nothing was acquired, so the same objects are retried.
        assert_eq!(engine.api().calls.len(), calls + 1);

        engine.api_mut().fences_stall = false;
        assert!(matches!(
            engine.render_frame().expect("frame"),
            FrameOutcome::Presented { image_index: 0 }
        ));
    }

    #[test]
    fn stalled_image_fence_rebuilds_before_reporting() {
        let mut api = MockApi::new();
        let image_zero = AcquireOutcome::Acquired {
            image_index: 0,
            suboptimal: false,
        };
        api.acquire_script.extend([image_zero, image_zero, image_zero]);
        let mut engine = connected_with(api, bounded());
        let (_, _, fence0) = element_handles(&engine, 0);
        let (acquire1, _, _) = element_handles(&engine, 1);
        let old = engine.swapchain().expect("swapchain").handle;

        engine.render_frame().expect("first frame");
        engine.api_mut().stalled_fences.insert(fence0);
        assert!(matches!(
            engine.render_frame(),
            Err(RendererError::FrameStall { op: "image fence wait", .. })
        ));

        // The signalled acquire semaphore went down with the old generation.
        assert_ne!(engine.swapchain().expect("swapchain").handle, old);
        assert!(engine.api().destroyed().contains(&(Kind::Semaphore, acquire1)));
        assert_eq!(engine.api().signalled_semaphores(), 0);
        assert_eq!(engine.frame_cursor(), FrameCursor::default());

        // Every later acquire is matched by the submission consuming it.
        for _ in 0..4 {
            engine.render_frame().expect("frame after stall");
        }
        let api = engine.api();
        assert_eq!(
            api.count(|call| matches!(call, Call::Acquire { .. })),
            api.count(|call| matches!(call, Call::Submit { .. })) + 1
        );
        assert_eq!(api.signalled_semaphores(), 0);
    }

    #[rstest]
    #[case::record(true, false)]
    #[case::submit(false, true)]
    fn failed_submission_does_not_strand_the_slot_fence(#[case] fail_record: bool, #[case] fail_submit: bool) {
        let mut engine = connected(MockApi::new());
        engine.render_frame().expect("frame");
        let old = engine.swapchain().expect("swapchain").handle;

        engine.api_mut().fail_record = fail_record;
        engine.api_mut().fail_submit = fail_submit;
        assert!(matches!(engine.render_frame(), Err(RendererError::Vulkan { .. })));
        assert_ne!(engine.swapchain().expect("swapchain").handle, old);

        // Unbounded waits: a fence left reset without a submission would hang here.
        for frame in 0..4 {
            assert_eq!(
                engine.render_frame().expect("frame after failure"),
                FrameOutcome::Presented { image_index: frame % 3 }
            );
        }
        assert_eq!(engine.api().signalled_semaphores(), 0);
    }

    #[test]
    fn frame_without_connection_fails() {
        let mut engine = PresentationEngine::new(MockApi::new(), settings(false));
        assert!(matches!(engine.render_frame(), Err(RendererError::NoSwapchain)));
        assert!(matches!(engine.start_swapchain(), Err(RendererError::NotConnected)));
    }

    #[test]
    fn resize_rebuilds_with_the_new_extent() {
        let mut engine = connected(MockApi::new());
        engine.render_frame().expect("frame");
        engine.resize(Extent::new(800, 600)).expect("resize");

        let swapchain = engine.swapchain().expect("swapchain");
        assert_eq!(swapchain.extent, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(engine.frame_cursor(), FrameCursor::default());
    }

    #[test]
    fn fixed_surface_extent_wins_over_window_size() {
        let mut api = MockApi::new();
        api.capabilities.current_extent = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        let engine = connected(api);
        assert_eq!(
            engine.swapchain().expect("swapchain").extent,
            vk::Extent2D {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn settings_follow_renderer_config() {
        let mut config = RendererConfig::default();
        config.present_mode = "fifo".into();
        config.frame_timeout_ms = 250;
        let settings = EngineSettings::from_config(&config, Extent::new(640, 480));
        assert_eq!(settings.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(settings.frame_timeout, Some(Duration::from_millis(250)));
        assert_eq!(settings.timeout_ns(), 250_000_000);
        assert_eq!(settings.initial_extent, Extent::new(640, 480));
    }
}
