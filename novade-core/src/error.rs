//! Errors raised while preparing the window stack: reading `window.toml`,
//! resolving XDG directories and installing the tracing subscriber.
//!
//! Runtime failures of the compositor client and the presentation engine
//! live in their own crates; they only wrap [`CoreError`] at the window
//! level.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::problem::{AsProblem, ProblemCode};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging Error: {0}")]
    Logging(#[from] LoggingError),

    /// A directory needed for logs or configuration could not be prepared.
    #[error("Filesystem Error: {message} ({})", path.display())]
    Filesystem {
        message: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// `window.toml` exists but could not be read.
    #[error("Cannot read {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed window configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value parsed but cannot be used, such as a zero width.
    #[error("Invalid window configuration: {0}")]
    ValidationError(String),

    /// `HOME` (or the platform equivalent) is not set.
    #[error("No {dir_type} directory available")]
    DirectoryUnavailable { dir_type: String },
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Cannot install tracing subscriber: {0}")]
    InitializationFailure(String),

    #[error("Bad log filter directive: {0}")]
    FilterError(String),
}

impl AsProblem for CoreError {
    fn problem_code(&self) -> ProblemCode {
        ProblemCode::Configuration
    }
}
