//! # NovaDE Core Library (`novade-core`)
//!
//! Shared infrastructure for the NovaDE window stack: the Wayland client, the
//! Vulkan presentation engine and the window orchestrator all build on it.
//!
//! - **Error Handling**: [`CoreError`] with [`ConfigError`] and [`LoggingError`].
//! - **Problem Reporting**: [`problem::Problem`] classification and the
//!   [`problem::ProblemReporter`] seam that decides what is fatal.
//! - **Configuration**: TOML loading with defaults and validation through
//!   [`ConfigLoader`] and [`CoreConfig`].
//! - **Logging**: `tracing` based console and file output.
//! - **Types**: [`Extent`], the pixel size shared by window and swapchain.
//!
//! ```rust,ignore
//! use novade_core::config::ConfigLoader;
//! use novade_core::logging::init_logging;
//! use novade_core::error::CoreError;
//!
//! fn main() -> Result<(), CoreError> {
//!     let core_config = ConfigLoader::load()?;
//!     init_logging(&core_config.logging, false)?;
//!     tracing::info!("NovaDE core initialized.");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod problem;
pub mod types;
pub mod utils;

pub use config::{ConfigLoader, CoreConfig, LoggingConfig, RendererConfig, WindowConfig};
pub use error::{ConfigError, CoreError, LoggingError};
pub use logging::{init_logging, init_minimal_logging};
pub use problem::{AsProblem, Escalation, Problem, ProblemCode, ProblemReporter, Severity, TracingReporter};
pub use types::Extent;
