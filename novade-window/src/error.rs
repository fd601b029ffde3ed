use novade_core::error::CoreError;
use novade_core::problem::{AsProblem, ProblemCode};
use novade_vulkan_renderer::RendererError;
use novade_wayland_client::WaylandError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Compositor: {0}")]
    Compositor(#[from] WaylandError),

    #[error("Renderer: {0}")]
    Renderer(#[from] RendererError),

    #[error("Core: {0}")]
    Core(#[from] CoreError),

    /// The window was already torn down.
    #[error("Window is closed")]
    Closed,

    /// Already pushed to the window's problem reporter, which escalated it.
    #[error(transparent)]
    Reported(Box<WindowError>),
}

impl WindowError {
    /// Whether a problem reporter has already seen this error.
    pub fn is_reported(&self) -> bool {
        matches!(self, WindowError::Reported(_))
    }
}

impl AsProblem for WindowError {
    fn problem_code(&self) -> ProblemCode {
        match self {
            WindowError::Compositor(err) => err.problem_code(),
            WindowError::Renderer(err) => err.problem_code(),
            WindowError::Core(_) => ProblemCode::Configuration,
            WindowError::Closed => ProblemCode::ConnectionFailed,
            WindowError::Reported(inner) => inner.problem_code(),
        }
    }
}
