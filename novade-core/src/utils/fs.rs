//! Filesystem helpers.

use crate::error::CoreError;
use std::io;
use std::path::Path;

/// Creates `dir` and its missing parents. An existing directory is fine; a
/// file in its place is an error.
pub fn ensure_dir_exists(dir: &Path) -> Result<(), CoreError> {
    let failure = |message: &str, source: io::Error| CoreError::Filesystem {
        message: message.to_string(),
        path: dir.to_path_buf(),
        source,
    };

    match dir.metadata() {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(failure(
            "Not a directory",
            io::Error::new(io::ErrorKind::AlreadyExists, "a file occupies the path"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::fs::create_dir_all(dir).map_err(|e| failure("Cannot create directory", e))
        }
        Err(e) => Err(failure("Cannot inspect directory", e)),
    }
}
