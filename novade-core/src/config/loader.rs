//! Locating, parsing and validating `window.toml`.
//!
//! The file is looked up at `$NOVADE_WINDOW_CONFIG` when that variable is set
//! and non-empty, else at `<XDG config dir>/novade/window.toml`. A file that
//! does not exist yields the defaults, so the demo runs without any setup:
//!
//! ```rust,ignore
//! let config = ConfigLoader::load()?;
//! assert_eq!(config.renderer.engine_name, "Iridium");
//! ```

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::{CoreConfig, RendererConfig, WindowConfig};
use crate::error::{ConfigError, CoreError};
use crate::utils::fs as nova_fs;
use crate::utils::paths::{get_app_config_dir, get_app_state_dir};

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "NOVADE_WINDOW_CONFIG";

/// File name looked up inside the application config directory.
pub const CONFIG_FILE_NAME: &str = "window.toml";

/// Names accepted in `window.required_capabilities`.
pub const KNOWN_CAPABILITIES: [&str; 4] = ["window_menu", "maximize", "fullscreen", "minimize"];

/// Namespace for configuration loading logic.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates the configuration from its default location.
    pub fn load() -> Result<CoreConfig, CoreError> {
        let path = Self::config_path_from(env::var_os(CONFIG_PATH_ENV), get_app_config_dir)?;
        Self::load_from_path(&path)
    }

    /// Loads and validates the configuration stored at `path`.
    ///
    /// A missing or blank file produces the defaults. Any other read failure is
    /// a [`ConfigError::ReadError`].
    pub fn load_from_path(path: &Path) -> Result<CoreConfig, CoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                String::new()
            }
            Err(e) => {
                return Err(CoreError::Config(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                }))
            }
        };
        Self::load_from_str(&content)
    }

    /// Parses and validates configuration text.
    pub fn load_from_str(content: &str) -> Result<CoreConfig, CoreError> {
        let mut config: CoreConfig = if content.trim().is_empty() {
            CoreConfig::default()
        } else {
            toml::from_str(content).map_err(ConfigError::ParseError)?
        };
        Self::validate_config(&mut config)?;
        Ok(config)
    }

    /// Picks the override when present, otherwise asks `config_dir` for the base.
    fn config_path_from<F>(override_path: Option<OsString>, config_dir: F) -> Result<PathBuf, CoreError>
    where
        F: FnOnce() -> Result<PathBuf, CoreError>,
    {
        match override_path {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(config_dir()?.join(CONFIG_FILE_NAME)),
        }
    }

    /// Validates the configuration and normalizes it in place.
    ///
    /// Log level and format are lowercased. A relative log file path is made
    /// absolute against the application state directory and its parent
    /// directory is created.
    pub fn validate_config(config: &mut CoreConfig) -> Result<(), CoreError> {
        let level_lower = config.logging.level.to_lowercase();
        match level_lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => config.logging.level = level_lower,
            _ => {
                return Err(validation(format!(
                    "Invalid log level: '{}'. Must be one of trace, debug, info, warn, error.",
                    config.logging.level
                )))
            }
        }

        let format_lower = config.logging.format.to_lowercase();
        match format_lower.as_str() {
            "text" | "json" => config.logging.format = format_lower,
            _ => {
                return Err(validation(format!(
                    "Invalid log format: '{}'. Must be one of text, json.",
                    config.logging.format
                )))
            }
        }

        if let Some(file_path) = &config.logging.file_path {
            let absolute_path = if file_path.is_absolute() {
                file_path.clone()
            } else {
                get_app_state_dir()?.join(file_path)
            };
            if let Some(parent_dir) = absolute_path.parent() {
                if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                    nova_fs::ensure_dir_exists(parent_dir)?;
                }
            }
            config.logging.file_path = Some(absolute_path);
        }

        Self::validate_window_config(&mut config.window)?;
        Self::validate_renderer_config(&mut config.renderer)?;
        Ok(())
    }

    fn validate_window_config(window: &mut WindowConfig) -> Result<(), CoreError> {
        if window.width == 0 || window.height == 0 {
            return Err(validation(format!(
                "Invalid window size {}x{}: both dimensions must be positive.",
                window.width, window.height
            )));
        }

        for capability in window.required_capabilities.iter_mut() {
            let lower = capability.to_lowercase();
            if !KNOWN_CAPABILITIES.contains(&lower.as_str()) {
                return Err(validation(format!(
                    "Unknown window capability: '{}'. Must be one of {}.",
                    capability,
                    KNOWN_CAPABILITIES.join(", ")
                )));
            }
            *capability = lower;
        }
        Ok(())
    }

    fn validate_renderer_config(renderer: &mut RendererConfig) -> Result<(), CoreError> {
        let mode_lower = renderer.present_mode.to_lowercase();
        match mode_lower.as_str() {
            "mailbox" | "fifo" => renderer.present_mode = mode_lower,
            _ => {
                return Err(validation(format!(
                    "Invalid present_mode: '{}'. Must be one of mailbox, fifo.",
                    renderer.present_mode
                )))
            }
        }

        if renderer
            .clear_color
            .iter()
            .any(|channel| !(0.0..=1.0).contains(channel))
        {
            return Err(validation(format!(
                "Invalid clear_color {:?}: every channel must lie in [0, 1].",
                renderer.clear_color
            )));
        }
        Ok(())
    }
}

fn validation(message: String) -> CoreError {
    CoreError::Config(ConfigError::ValidationError(message))
}
