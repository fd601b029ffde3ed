//! Configure negotiation for an xdg toplevel, independent of the wire.
//!
//! The compositor proposes a size with `xdg_toplevel.configure` and closes
//! the sequence with `xdg_surface.configure`, which the client acknowledges
//! on the spot. A proposed size is only *applied* by the owning loop, once
//! both halves of the sequence have arrived, because applying it means
//! rebuilding the swapchain behind a blocking GPU idle wait.

use std::fmt;

use novade_core::Extent;

/// Where the toplevel is in the configure sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurePhase {
    /// No configure received yet.
    Unconfigured,
    /// A toplevel configure arrived; the surface configure has not.
    AwaitingAck,
    /// The last configure sequence was acknowledged.
    Ready,
}

/// Window-manager features a compositor can advertise (xdg_wm_base v5+).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WmCapability {
    WindowMenu,
    Maximize,
    Fullscreen,
    Minimize,
}

impl WmCapability {
    /// Maps the protocol value; unknown values are ignored.
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            1 => Some(WmCapability::WindowMenu),
            2 => Some(WmCapability::Maximize),
            3 => Some(WmCapability::Fullscreen),
            4 => Some(WmCapability::Minimize),
            _ => None,
        }
    }

    /// Maps the configuration name (`window_menu`, `maximize`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "window_menu" => Some(WmCapability::WindowMenu),
            "maximize" => Some(WmCapability::Maximize),
            "fullscreen" => Some(WmCapability::Fullscreen),
            "minimize" => Some(WmCapability::Minimize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WmCapability::WindowMenu => "window_menu",
            WmCapability::Maximize => "maximize",
            WmCapability::Fullscreen => "fullscreen",
            WmCapability::Minimize => "minimize",
        }
    }
}

impl fmt::Display for WmCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded `xdg_toplevel` state array. Tiling states are not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowStates {
    pub maximized: bool,
    pub fullscreen: bool,
    pub resizing: bool,
    pub activated: bool,
}

/// Splits a `wl_array` of `u32` values in native byte order.
fn decode_u32_array(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

impl WindowStates {
    pub fn decode(bytes: &[u8]) -> Self {
        let mut states = WindowStates::default();
        for value in decode_u32_array(bytes) {
            match value {
                1 => states.maximized = true,
                2 => states.fullscreen = true,
                3 => states.resizing = true,
                4 => states.activated = true,
                _ => {}
            }
        }
        states
    }
}

/// Toplevel negotiation state owned by the compositor client.
#[derive(Debug, Clone)]
pub struct ToplevelState {
    phase: ConfigurePhase,
    resize_requested: bool,
    ready_to_apply: bool,
    pending: Extent,
    current: Extent,
    states: WindowStates,
    bounds: Option<Extent>,
    capabilities: Option<Vec<WmCapability>>,
    close_requested: bool,
}

impl ToplevelState {
    /// `initial` is the size used until the compositor proposes one.
    pub fn new(initial: Extent) -> Self {
        Self {
            phase: ConfigurePhase::Unconfigured,
            resize_requested: false,
            ready_to_apply: false,
            pending: initial,
            current: initial,
            states: WindowStates::default(),
            bounds: None,
            capabilities: None,
            close_requested: false,
        }
    }

    /// Handles `xdg_toplevel.configure`. A zero dimension means the client
    /// may choose, so only a fully specified size arms a resize.
    pub fn on_toplevel_configure(&mut self, width: i32, height: i32, states: &[u8]) {
        self.phase = ConfigurePhase::AwaitingAck;
        self.states = WindowStates::decode(states);
        if let Some(size) = Extent::from_signed(width, height) {
            self.pending = size;
            self.resize_requested = true;
        }
    }

    /// Handles `xdg_surface.configure` once its serial has been acknowledged.
    pub fn on_surface_configure(&mut self) {
        self.phase = ConfigurePhase::Ready;
        if self.resize_requested {
            self.ready_to_apply = true;
        }
    }

    pub fn on_bounds(&mut self, width: i32, height: i32) {
        self.bounds = Extent::from_signed(width, height);
    }

    pub fn on_capabilities(&mut self, bytes: &[u8]) {
        self.capabilities = Some(decode_u32_array(bytes).filter_map(WmCapability::from_raw).collect());
    }

    /// The size to apply, once both halves of a configure sequence are in.
    pub fn pending_resize(&self) -> Option<Extent> {
        (self.resize_requested && self.ready_to_apply).then_some(self.pending)
    }

    /// Marks the pending resize as applied and clears both flags.
    pub fn complete_resize(&mut self) -> Option<Extent> {
        let size = self.pending_resize()?;
        self.current = size;
        self.resize_requested = false;
        self.ready_to_apply = false;
        Some(size)
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    pub fn phase(&self) -> ConfigurePhase {
        self.phase
    }

    /// The size the swapchain was last built for.
    pub fn current_extent(&self) -> Extent {
        self.current
    }

    pub fn states(&self) -> WindowStates {
        self.states
    }

    pub fn bounds(&self) -> Option<Extent> {
        self.bounds
    }

    /// `None` until the compositor reports capabilities.
    pub fn capabilities(&self) -> Option<&[WmCapability]> {
        self.capabilities.as_deref()
    }

    /// Entries of `required` the compositor reported as unsupported. Empty
    /// while no report has arrived.
    pub fn missing_capabilities(&self, required: &[WmCapability]) -> Vec<WmCapability> {
        match &self.capabilities {
            Some(reported) => required
                .iter()
                .filter(|capability| !reported.contains(capability))
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn resize_requested(&self) -> bool {
        self.resize_requested
    }

    pub fn ready_to_apply(&self) -> bool {
        self.ready_to_apply
    }
}
