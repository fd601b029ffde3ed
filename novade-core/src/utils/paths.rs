//! Where the window stack keeps its files.
//!
//! `window.toml` lives in the XDG config directory, log files in the XDG
//! state directory, both under a `novade` subdirectory. Resolution goes
//! through `directories-next` and fails with
//! [`ConfigError::DirectoryUnavailable`] when no home directory is known.

use crate::error::{ConfigError, CoreError};
use directories_next::BaseDirs;
use std::path::PathBuf;

const APPLICATION: &str = "novade";

fn base_dirs(dir_type: &str) -> Result<BaseDirs, CoreError> {
    BaseDirs::new().ok_or_else(|| {
        ConfigError::DirectoryUnavailable {
            dir_type: dir_type.to_string(),
        }
        .into()
    })
}

/// `$XDG_STATE_HOME`, falling back to `~/.local/state`. `directories-next`
/// has no notion of a state directory, so non-Linux targets use local data.
fn state_home(dirs: &BaseDirs) -> PathBuf {
    if cfg!(target_os = "linux") {
        std::env::var_os("XDG_STATE_HOME")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| dirs.home_dir().join(".local").join("state"))
    } else {
        dirs.data_local_dir().to_path_buf()
    }
}

/// Directory holding `window.toml`, e.g. `~/.config/novade`.
pub fn get_app_config_dir() -> Result<PathBuf, CoreError> {
    Ok(base_dirs("config")?.config_dir().join(APPLICATION))
}

/// Directory relative log file paths resolve against, e.g.
/// `~/.local/state/novade`.
pub fn get_app_state_dir() -> Result<PathBuf, CoreError> {
    Ok(state_home(&base_dirs("state")?).join(APPLICATION))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Build sandboxes may run without HOME.
    fn check(resolved: Result<PathBuf, CoreError>) {
        match resolved {
            Ok(path) => {
                assert!(path.is_absolute(), "{} is relative", path.display());
                assert!(path.ends_with(APPLICATION));
            }
            Err(CoreError::Config(ConfigError::DirectoryUnavailable { .. })) => {}
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn config_dir_is_namespaced() {
        check(get_app_config_dir());
    }

    #[test]
    fn state_dir_is_namespaced() {
        check(get_app_state_dir());
    }
}
