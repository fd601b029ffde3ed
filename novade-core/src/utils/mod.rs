//! General utilities for NovaDE core.
//!
//! - [`fs`]: filesystem helpers such as [`fs::ensure_dir_exists`].
//! - [`paths`]: XDG base directory and application directory resolution.

pub mod fs;
pub mod paths;

pub use fs::ensure_dir_exists;
