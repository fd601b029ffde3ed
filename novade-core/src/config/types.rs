//! Configuration data structures.
//!
//! These structs are populated by deserializing a TOML file. Every field has
//! a default from [`super::defaults`], so an empty file (or no file at all)
//! yields a usable configuration. Unknown fields are rejected via
//! `#[serde(deny_unknown_fields)]`.

use super::defaults;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration settings for the logging subsystem.
///
/// ```
/// use novade_core::config::LoggingConfig;
///
/// let log_config: LoggingConfig = toml::from_str(r#"
/// level = "debug"
/// format = "json"
/// "#).unwrap();
/// assert_eq!(log_config.level, "debug");
/// assert_eq!(log_config.file_path, None);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Valid values (case-insensitive): "trace", "debug", "info", "warn", "error".
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
    /// Optional log file. Relative paths are resolved against the state directory.
    #[serde(default = "defaults::default_log_file_path")]
    pub file_path: Option<PathBuf>,
    /// Valid values (case-insensitive): "text", "json".
    #[serde(default = "defaults::default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::default_log_level(),
            file_path: defaults::default_log_file_path(),
            format: defaults::default_log_format(),
        }
    }
}

/// Settings for the top-level window and its compositor negotiation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    #[serde(default = "defaults::default_title")]
    pub title: String,
    #[serde(default = "defaults::default_app_id")]
    pub app_id: String,
    /// Initial swapchain width, used until the compositor suggests a size.
    #[serde(default = "defaults::default_width")]
    pub width: u32,
    /// Initial swapchain height.
    #[serde(default = "defaults::default_height")]
    pub height: u32,
    /// Ask the compositor for fullscreen right after the toplevel is created.
    #[serde(default = "defaults::default_bool_false")]
    pub fullscreen: bool,
    /// Treat a missing entry of `required_capabilities` as fatal.
    #[serde(default = "defaults::default_bool_false")]
    pub enforce_capabilities: bool,
    /// Any of "window_menu", "maximize", "fullscreen", "minimize".
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: defaults::default_title(),
            app_id: defaults::default_app_id(),
            width: defaults::default_width(),
            height: defaults::default_height(),
            fullscreen: false,
            enforce_capabilities: false,
            required_capabilities: Vec::new(),
        }
    }
}

/// Settings for the GPU presentation engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RendererConfig {
    #[serde(default = "defaults::default_application_name")]
    pub application_name: String,
    #[serde(default = "defaults::default_engine_name")]
    pub engine_name: String,
    /// Requires the Khronos validation layer and the debug-utils extension.
    #[serde(default = "defaults::default_enable_validation")]
    pub enable_validation: bool,
    /// "mailbox" or "fifo". FIFO is used whenever the preference is unsupported.
    #[serde(default = "defaults::default_present_mode")]
    pub present_mode: String,
    /// RGBA clear colour of the render pass, each channel in `[0, 1]`.
    #[serde(default = "defaults::default_clear_color")]
    pub clear_color: [f32; 4],
    /// Upper bound for fence waits and image acquisition. Zero means unbounded.
    #[serde(default = "defaults::default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
}

impl RendererConfig {
    /// The configured frame timeout, `None` when waits are unbounded.
    pub fn frame_timeout(&self) -> Option<Duration> {
        (self.frame_timeout_ms > 0).then(|| Duration::from_millis(self.frame_timeout_ms))
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: defaults::default_application_name(),
            engine_name: defaults::default_engine_name(),
            enable_validation: defaults::default_enable_validation(),
            present_mode: defaults::default_present_mode(),
            clear_color: defaults::default_clear_color(),
            frame_timeout_ms: defaults::default_frame_timeout_ms(),
        }
    }
}

/// Root configuration structure.
///
/// ```
/// use novade_core::config::CoreConfig;
///
/// let loaded: CoreConfig = toml::from_str(r#"
/// [logging]
/// level = "warn"
///
/// [window]
/// title = "Demo"
/// "#).unwrap();
/// assert_eq!(loaded.logging.level, "warn");
/// assert_eq!(loaded.window.title, "Demo");
/// assert_eq!(loaded.renderer.present_mode, "mailbox");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    #[serde(default = "defaults::default_logging_config")]
    pub logging: LoggingConfig,
    #[serde(default = "defaults::default_window_config")]
    pub window: WindowConfig,
    #[serde(default = "defaults::default_renderer_config")]
    pub renderer: RendererConfig,
}
