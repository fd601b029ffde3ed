//! Wayland compositor client for the NovaDE window stack.
//!
//! Owns the display connection and one xdg-shell toplevel window. The
//! presentation engine consumes the raw display and surface handles; the
//! window loop consumes resize and close state.
//!
//! ```rust,ignore
//! use novade_wayland_client::{ClientSettings, CompositorClient};
//!
//! let mut client = CompositorClient::new(ClientSettings::default());
//! client.connect()?;
//! while !client.should_close() {
//!     client.sync()?;
//! }
//! client.disconnect();
//! ```

pub mod client;
pub mod error;
pub mod monitor;
pub mod toplevel;

pub use client::{ClientSettings, CompositorClient};
pub use error::WaylandError;
pub use monitor::{millihertz_to_hertz, Monitor, MonitorBuilder};
pub use toplevel::{ConfigurePhase, ToplevelState, WindowStates, WmCapability};
