//! Window orchestration for the NovaDE presentation stack.
//!
//! [`Window`] connects a [`Compositor`] and then a [`Presenter`] against the
//! compositor's native handles, runs the frame loop and tears both down in
//! reverse order.
//!
//! ```rust,ignore
//! use novade_core::config::ConfigLoader;
//! use novade_window::Window;
//!
//! let config = ConfigLoader::load()?;
//! let mut window = Window::open(&config)?;
//! window.run()?;
//! ```

pub mod backend;
pub mod error;
pub mod window;

pub use backend::{Compositor, Presenter};
pub use error::WindowError;
pub use window::Window;
