//! The compositor connection and the window surface it hosts.
//!
//! [`CompositorClient`] binds `wl_compositor`, `wl_output` and `xdg_wm_base`,
//! creates the `wl_surface -> xdg_surface -> xdg_toplevel` chain and pumps
//! the event queue once per frame through [`CompositorClient::sync`]. Every
//! protocol object lives in a private session that is torn down in reverse
//! creation order, either by [`CompositorClient::disconnect`] or on drop.

use std::ffi::c_void;
use std::ptr::NonNull;

use novade_core::{Extent, WindowConfig};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle};
use tracing::{debug, info, trace, warn};
use wayland_client::{
    delegate_noop,
    protocol::{
        wl_compositor::WlCompositor,
        wl_output::{self, WlOutput},
        wl_registry::{self, WlRegistry},
        wl_surface::WlSurface,
    },
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

use crate::error::WaylandError;
use crate::monitor::{Monitor, MonitorBuilder};
use crate::toplevel::{ToplevelState, WindowStates, WmCapability};

/// Highest `wl_output` version bound; v4 adds `name` and `description`.
const MAX_OUTPUT_VERSION: u32 = 4;
/// `xdg_wm_base` version that introduced `wm_capabilities`.
const WM_CAPABILITIES_SINCE: u32 = 5;
/// `wl_output` version that introduced `release`.
const OUTPUT_RELEASE_SINCE: u32 = 3;

/// Window parameters the client negotiates with the compositor.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub title: String,
    pub app_id: String,
    /// Size reported until the first configure is applied.
    pub initial_extent: Extent,
    pub fullscreen: bool,
    pub enforce_capabilities: bool,
    pub required_capabilities: Vec<WmCapability>,
}

impl ClientSettings {
    pub fn from_config(config: &WindowConfig) -> Result<Self, WaylandError> {
        let required_capabilities = config
            .required_capabilities
            .iter()
            .map(|name| WmCapability::from_name(name).ok_or_else(|| WaylandError::UnknownCapability(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            title: config.title.clone(),
            app_id: config.app_id.clone(),
            initial_extent: Extent::new(config.width, config.height),
            fullscreen: config.fullscreen,
            enforce_capabilities: config.enforce_capabilities,
            required_capabilities,
        })
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            title: "SimpleWindow".to_string(),
            app_id: "SimpleWindow".to_string(),
            initial_extent: Extent::new(1280, 720),
            fullscreen: false,
            enforce_capabilities: false,
            required_capabilities: Vec::new(),
        }
    }
}

/// A registry global together with its numeric name, needed for removal.
struct Bound<P> {
    name: u32,
    proxy: P,
}

/// Event-dispatch state for one connection.
struct ClientState {
    registry: Option<WlRegistry>,
    compositor: Option<Bound<WlCompositor>>,
    output: Option<Bound<WlOutput>>,
    output_seen: bool,
    wm_base: Option<Bound<XdgWmBase>>,
    surface: Option<WlSurface>,
    xdg_surface: Option<XdgSurface>,
    toplevel: Option<XdgToplevel>,
    monitor_builder: MonitorBuilder,
    monitor: Option<Monitor>,
    window: ToplevelState,
}

impl ClientState {
    fn new(initial_extent: Extent) -> Self {
        Self {
            registry: None,
            compositor: None,
            output: None,
            output_seen: false,
            wm_base: None,
            surface: None,
            xdg_surface: None,
            toplevel: None,
            monitor_builder: MonitorBuilder::default(),
            monitor: None,
            window: ToplevelState::new(initial_extent),
        }
    }

    fn bind<I>(registry: &WlRegistry, name: u32, version: u32, max_version: u32, qh: &QueueHandle<Self>) -> Bound<I>
    where
        I: Proxy + 'static,
        ClientState: Dispatch<I, ()>,
    {
        let version = version.min(max_version);
        let proxy = registry.bind::<I, (), ClientState>(name, version, qh, ());
        info!(interface = I::interface().name, version, "Bound Wayland global");
        Bound { name, proxy }
    }

    fn on_global(&mut self, registry: &WlRegistry, name: u32, interface: &str, version: u32, qh: &QueueHandle<Self>) {
        trace!(name, interface, version, "Wayland global advertised");
        match interface {
            "wl_compositor" if self.compositor.is_none() => {
                let max = WlCompositor::interface().version;
                self.compositor = Some(Self::bind(registry, name, version, max, qh));
            }
            "xdg_wm_base" if self.wm_base.is_none() => {
                let max = XdgWmBase::interface().version;
                self.wm_base = Some(Self::bind(registry, name, version, max, qh));
            }
            "wl_output" if !self.output_seen => {
                let max = MAX_OUTPUT_VERSION.min(WlOutput::interface().version);
                self.output = Some(Self::bind(registry, name, version, max, qh));
                self.output_seen = true;
            }
            "wl_compositor" | "xdg_wm_base" | "wl_output" => {
                debug!(name, interface, "Ignoring additional advertisement of a bound global");
            }
            _ => {}
        }
    }

    fn on_global_remove(&mut self, name: u32) {
        if self.output.as_ref().is_some_and(|bound| bound.name == name) {
            warn!(name, "Output removed before it finished describing itself");
            if let Some(bound) = self.output.take() {
                release_output(bound.proxy);
            }
        } else if self.compositor.as_ref().is_some_and(|bound| bound.name == name)
            || self.wm_base.as_ref().is_some_and(|bound| bound.name == name)
        {
            warn!(name, "A bound Wayland global was withdrawn by the compositor");
        } else {
            debug!(name, "Wayland global removed");
        }
    }

    fn finish_monitor(&mut self) {
        let monitor = std::mem::take(&mut self.monitor_builder).finish();
        info!(
            width = monitor.width,
            height = monitor.height,
            refresh_rate = monitor.refresh_rate,
            scale = monitor.scale,
            name = monitor.name.as_deref().unwrap_or("unknown"),
            "Monitor described"
        );
        self.monitor = Some(monitor);
        if let Some(bound) = self.output.take() {
            release_output(bound.proxy);
        }
    }

    /// Destroys every protocol object in reverse creation order.
    fn destroy_objects(&mut self) {
        if let Some(toplevel) = self.toplevel.take() {
            toplevel.destroy();
            debug!("Destroyed xdg_toplevel");
        }
        if let Some(xdg_surface) = self.xdg_surface.take() {
            xdg_surface.destroy();
            debug!("Destroyed xdg_surface");
        }
        if let Some(surface) = self.surface.take() {
            surface.destroy();
            debug!("Destroyed wl_surface");
        }
        if let Some(wm_base) = self.wm_base.take() {
            wm_base.proxy.destroy();
            debug!("Destroyed xdg_wm_base");
        }
        if let Some(output) = self.output.take() {
            release_output(output.proxy);
        }
        // wl_compositor and wl_registry have no destructor request.
        if self.compositor.take().is_some() {
            debug!("Dropped wl_compositor");
        }
        if self.registry.take().is_some() {
            debug!("Dropped wl_registry");
        }
    }
}

fn release_output(output: WlOutput) {
    if output.version() >= OUTPUT_RELEASE_SINCE {
        output.release();
        debug!("Released wl_output");
    }
}

impl Dispatch<WlRegistry, ()> for ClientState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => state.on_global(registry, name, &interface, version, qh),
            wl_registry::Event::GlobalRemove { name } => state.on_global_remove(name),
            _ => {}
        }
    }
}

impl Dispatch<WlOutput, ()> for ClientState {
    fn event(state: &mut Self, _: &WlOutput, event: wl_output::Event, _: &(), _: &Connection, _: &QueueHandle<Self>) {
        match event {
            wl_output::Event::Geometry { x, y, .. } => state.monitor_builder.geometry(x, y),
            wl_output::Event::Mode {
                flags,
                width,
                height,
                refresh,
            } => {
                let current = matches!(flags, WEnum::Value(mode) if mode.contains(wl_output::Mode::Current));
                state.monitor_builder.mode(current, width, height, refresh);
            }
            wl_output::Event::Scale { factor } => state.monitor_builder.scale(factor),
            wl_output::Event::Name { name } => state.monitor_builder.name(name),
            wl_output::Event::Description { description } => state.monitor_builder.description(description),
            wl_output::Event::Done => state.finish_monitor(),
            _ => {}
        }
    }
}

impl Dispatch<XdgWmBase, ()> for ClientState {
    fn event(_: &mut Self, wm_base: &XdgWmBase, event: xdg_wm_base::Event, _: &(), _: &Connection, _: &QueueHandle<Self>) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
            trace!(serial, "Answered xdg_wm_base ping");
        }
    }
}

impl Dispatch<XdgSurface, ()> for ClientState {
    fn event(
        state: &mut Self,
        xdg_surface: &XdgSurface,
        event: xdg_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            state.window.on_surface_configure();
            trace!(serial, "Acknowledged xdg_surface configure");
        }
    }
}

impl Dispatch<XdgToplevel, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, states } => {
                debug!(width, height, "Toplevel configured");
                state.window.on_toplevel_configure(width, height, &states);
            }
            xdg_toplevel::Event::Close => {
                info!("Compositor requested the window to close");
                state.window.request_close();
            }
            xdg_toplevel::Event::ConfigureBounds { width, height } => {
                debug!(width, height, "Toplevel bounds reported");
                state.window.on_bounds(width, height);
            }
            xdg_toplevel::Event::WmCapabilities { capabilities } => {
                state.window.on_capabilities(&capabilities);
                debug!(capabilities = ?state.window.capabilities(), "Window manager capabilities reported");
            }
            _ => {}
        }
    }
}

delegate_noop!(ClientState: WlCompositor);
delegate_noop!(ClientState: ignore WlSurface);

/// Everything that exists between a successful connect and disconnect.
struct Session {
    connection: Connection,
    event_queue: EventQueue<ClientState>,
    state: ClientState,
}

impl Session {
    fn roundtrip(&mut self) -> Result<usize, WaylandError> {
        Ok(self.event_queue.roundtrip(&mut self.state)?)
    }

    fn establish(&mut self, settings: &ClientSettings) -> Result<(), WaylandError> {
        let qh = self.event_queue.handle();
        self.state.registry = Some(self.connection.display().get_registry(&qh, ()));
        self.roundtrip()?;

        let compositor = self
            .state
            .compositor
            .as_ref()
            .map(|bound| bound.proxy.clone())
            .ok_or(WaylandError::MissingGlobal("wl_compositor"))?;
        let wm_base = self
            .state
            .wm_base
            .as_ref()
            .map(|bound| bound.proxy.clone())
            .ok_or(WaylandError::MissingGlobal("xdg_wm_base"))?;
        if !self.state.output_seen {
            return Err(WaylandError::MissingGlobal("wl_output"));
        }
        if wm_base.version() < WM_CAPABILITIES_SINCE {
            info!(
                version = wm_base.version(),
                "xdg_wm_base predates capability reports, capabilities are not enforced"
            );
        }

        let surface = compositor.create_surface(&qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&surface, &qh, ());
        let toplevel = xdg_surface.get_toplevel(&qh, ());
        toplevel.set_title(settings.title.clone());
        toplevel.set_app_id(settings.app_id.clone());
        if settings.fullscreen {
            toplevel.set_fullscreen(None);
        }
        surface.commit();

        self.state.surface = Some(surface.clone());
        self.state.xdg_surface = Some(xdg_surface);
        self.state.toplevel = Some(toplevel);

        // Lets the compositor answer with its first configure sequence.
        self.roundtrip()?;
        surface.commit();
        self.connection.flush()?;
        Ok(())
    }

    fn check_capabilities(&self, settings: &ClientSettings) -> Result<(), WaylandError> {
        if !settings.enforce_capabilities {
            return Ok(());
        }
        let missing = self.state.window.missing_capabilities(&settings.required_capabilities);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(WaylandError::MissingCapabilities(missing))
        }
    }

    fn teardown(&mut self) {
        self.state.destroy_objects();
        if let Err(e) = self.connection.flush() {
            warn!(error = %e, "Failed to flush destructor requests");
        }
    }
}

/// Client side of one top-level window on a Wayland compositor.
pub struct CompositorClient {
    settings: ClientSettings,
    session: Option<Session>,
}

impl CompositorClient {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings, session: None }
    }

    pub fn from_config(config: &WindowConfig) -> Result<Self, WaylandError> {
        Ok(Self::new(ClientSettings::from_config(config)?))
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Opens the connection named by `WAYLAND_DISPLAY` and creates the window.
    ///
    /// On failure every object created so far is destroyed again and the
    /// client stays disconnected.
    pub fn connect(&mut self) -> Result<(), WaylandError> {
        if self.session.is_some() {
            return Err(WaylandError::AlreadyConnected);
        }

        let connection = Connection::connect_to_env()?;
        let event_queue = connection.new_event_queue();
        let mut session = Session {
            connection,
            event_queue,
            state: ClientState::new(self.settings.initial_extent),
        };

        let established = session
            .establish(&self.settings)
            .and_then(|()| session.check_capabilities(&self.settings));
        if let Err(e) = established {
            session.teardown();
            return Err(e);
        }

        info!(title = %self.settings.title, app_id = %self.settings.app_id, "Connected to Wayland compositor");
        self.session = Some(session);
        Ok(())
    }

    /// Destroys the window and closes the connection. Does nothing when not
    /// connected.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.teardown();
            info!("Disconnected from Wayland compositor");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// One blocking round trip. Pumps configure, close and capability events.
    pub fn sync(&mut self) -> Result<(), WaylandError> {
        let session = self.session.as_mut().ok_or(WaylandError::NotConnected)?;
        session.roundtrip()?;
        session.check_capabilities(&self.settings)
    }

    /// True once the compositor or the application asked to close. A client
    /// without a connection has nothing left to show.
    pub fn should_close(&self) -> bool {
        self.session.as_ref().map_or(true, |session| session.state.window.should_close())
    }

    pub fn close_window(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.state.window.request_close();
        }
    }

    /// The size of a fully negotiated, not yet applied resize.
    pub fn pending_resize(&self) -> Option<Extent> {
        self.session.as_ref()?.state.window.pending_resize()
    }

    /// Marks the pending resize as applied and commits the surface. Call after
    /// the swapchain has been rebuilt for the returned size.
    pub fn complete_resize(&mut self) -> Option<Extent> {
        let session = self.session.as_mut()?;
        let size = session.state.window.complete_resize()?;
        if let Some(surface) = session.state.surface.as_ref() {
            surface.commit();
        }
        debug!(%size, "Resize applied");
        Some(size)
    }

    /// The size the window content currently has.
    pub fn current_extent(&self) -> Extent {
        self.session
            .as_ref()
            .map_or(self.settings.initial_extent, |session| session.state.window.current_extent())
    }

    pub fn display_handle(&self) -> Result<RawDisplayHandle, WaylandError> {
        let session = self.session.as_ref().ok_or(WaylandError::NotConnected)?;
        let display = NonNull::new(session.connection.backend().display_ptr() as *mut c_void)
            .ok_or(WaylandError::NotConnected)?;
        Ok(RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display)))
    }

    pub fn window_handle(&self) -> Result<RawWindowHandle, WaylandError> {
        let surface = self
            .session
            .as_ref()
            .and_then(|session| session.state.surface.as_ref())
            .ok_or(WaylandError::NotConnected)?;
        let surface = NonNull::new(surface.id().as_ptr() as *mut c_void).ok_or(WaylandError::NotConnected)?;
        Ok(RawWindowHandle::Wayland(WaylandWindowHandle::new(surface)))
    }

    /// The monitor, once the output has sent `done`.
    pub fn monitor(&self) -> Option<&Monitor> {
        self.session.as_ref()?.state.monitor.as_ref()
    }

    pub fn window_states(&self) -> WindowStates {
        self.session
            .as_ref()
            .map(|session| session.state.window.states())
            .unwrap_or_default()
    }

    pub fn bounds(&self) -> Option<Extent> {
        self.session.as_ref()?.state.window.bounds()
    }

    pub fn capabilities(&self) -> Option<&[WmCapability]> {
        self.session.as_ref()?.state.window.capabilities()
    }
}

impl Drop for CompositorClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
