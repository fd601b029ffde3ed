//! Default configuration values.
//!
//! These functions are used by `serde`'s `default` attribute in the configuration
//! structures to provide sensible default values when they are not specified in
//! the configuration file.

use crate::config::{LoggingConfig, RendererConfig, WindowConfig};
use std::path::PathBuf;

pub(crate) fn default_logging_config() -> LoggingConfig {
    LoggingConfig::default()
}

pub(crate) fn default_window_config() -> WindowConfig {
    WindowConfig::default()
}

pub(crate) fn default_renderer_config() -> RendererConfig {
    RendererConfig::default()
}

/// Returns the default log level string (`"info"`).
pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

/// Returns the default log file path (`None`, console only).
pub(crate) fn default_log_file_path() -> Option<PathBuf> {
    None
}

/// Returns the default log format string (`"text"`).
pub(crate) fn default_log_format() -> String {
    "text".to_string()
}

pub(crate) fn default_title() -> String {
    "SimpleWindow".to_string()
}

pub(crate) fn default_app_id() -> String {
    "SimpleWindow".to_string()
}

/// Swapchain size used until the compositor sends its first configure.
pub(crate) fn default_width() -> u32 {
    1280
}

pub(crate) fn default_height() -> u32 {
    720
}

pub(crate) fn default_bool_false() -> bool {
    false
}

/// Validation is on in debug builds only.
pub(crate) fn default_enable_validation() -> bool {
    cfg!(debug_assertions)
}

pub(crate) fn default_application_name() -> String {
    "SimpleWindow".to_string()
}

pub(crate) fn default_engine_name() -> String {
    "Iridium".to_string()
}

pub(crate) fn default_present_mode() -> String {
    "mailbox".to_string()
}

/// Magenta, so an empty render pass is obvious on screen.
pub(crate) fn default_clear_color() -> [f32; 4] {
    [1.0, 0.0, 1.0, 1.0]
}

/// Zero keeps every GPU wait unbounded.
pub(crate) fn default_frame_timeout_ms() -> u64 {
    0
}
