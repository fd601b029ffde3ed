//! Configuration management for the NovaDE window stack.
//!
//! - [`types`]: the schema ([`CoreConfig`] and its sections).
//! - [`defaults`]: default values used by `serde` when a field is absent.
//! - [`loader`]: [`ConfigLoader`], which locates, parses and validates the file.
//!
//! ```rust,ignore
//! use novade_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?;
//! println!("initial size {}x{}", config.window.width, config.window.height);
//! ```

pub mod defaults;
pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{CoreConfig, LoggingConfig, RendererConfig, WindowConfig};
