//! Error type for the compositor client.

use novade_core::problem::{AsProblem, ProblemCode};
use thiserror::Error;
use wayland_client::{ConnectError, DispatchError};

use crate::toplevel::WmCapability;

#[derive(Debug, Error)]
pub enum WaylandError {
    /// The compositor socket could not be opened.
    #[error("Failed to connect to the Wayland compositor: {0}")]
    Connect(#[from] ConnectError),

    /// A global the client cannot work without was not advertised.
    #[error("Compositor does not advertise required global '{0}'")]
    MissingGlobal(&'static str),

    /// Enforcement is on and the compositor lacks window-manager features.
    #[error("Compositor lacks required window capabilities: {}", format_capabilities(.0))]
    MissingCapabilities(Vec<WmCapability>),

    /// A configured capability name is not recognised.
    #[error("Unknown window capability '{0}'")]
    UnknownCapability(String),

    /// The event stream broke or the compositor raised a protocol error.
    #[error("Wayland dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Flushing requests to the compositor failed.
    #[error("Wayland connection lost: {0}")]
    Backend(#[from] wayland_backend::client::WaylandError),

    #[error("Compositor client is already connected")]
    AlreadyConnected,

    #[error("Compositor client is not connected")]
    NotConnected,
}

fn format_capabilities(capabilities: &[WmCapability]) -> String {
    capabilities
        .iter()
        .map(WmCapability::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AsProblem for WaylandError {
    fn problem_code(&self) -> ProblemCode {
        match self {
            WaylandError::Connect(_) | WaylandError::NotConnected => ProblemCode::ConnectionFailed,
            WaylandError::MissingGlobal(_) => ProblemCode::MissingGlobal,
            WaylandError::MissingCapabilities(_) => ProblemCode::MissingCapability,
            WaylandError::UnknownCapability(_) => ProblemCode::Configuration,
            WaylandError::Dispatch(_) | WaylandError::Backend(_) => ProblemCode::ProtocolViolation,
            WaylandError::AlreadyConnected => ProblemCode::DoubleInit,
        }
    }
}
