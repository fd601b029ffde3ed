//! The window: a compositor toplevel presented by the GPU.

use novade_core::config::CoreConfig;
use novade_core::problem::{Escalation, Problem, ProblemReporter, TracingReporter};
use novade_core::Extent;
use novade_vulkan_renderer::{EngineSettings, FrameOutcome, PresentationEngine};
use novade_wayland_client::CompositorClient;
use tracing::{debug, info, warn};

use crate::backend::{Compositor, Presenter};
use crate::error::WindowError;

/// Owns a connected compositor and presenter and runs the frame loop.
///
/// The compositor is connected first and disconnected last.
pub struct Window<C: Compositor = CompositorClient, P: Presenter = PresentationEngine> {
    compositor: C,
    presenter: P,
    reporter: Box<dyn ProblemReporter>,
    open: bool,
}

impl Window {
    /// Builds the Wayland and Vulkan pair described by `config` and connects it.
    pub fn open(config: &CoreConfig) -> Result<Self, WindowError> {
        let compositor = CompositorClient::from_config(&config.window)?;
        let initial_extent = Extent::new(config.window.width, config.window.height);
        let presenter = PresentationEngine::load(EngineSettings::from_config(&config.renderer, initial_extent))?;
        Self::new(compositor, presenter)
    }
}

impl<C: Compositor, P: Presenter> Window<C, P> {
    /// Connects `compositor`, then `presenter` against its native handles.
    /// If the presenter fails the compositor is disconnected again.
    pub fn new(compositor: C, presenter: P) -> Result<Self, WindowError> {
        Self::with_reporter(compositor, presenter, Box::new(TracingReporter::default()))
    }

    pub fn with_reporter(
        mut compositor: C,
        mut presenter: P,
        reporter: Box<dyn ProblemReporter>,
    ) -> Result<Self, WindowError> {
        compositor.connect()?;

        let connected = compositor
            .native_handles()
            .and_then(|(display, window)| presenter.connect(display, window));
        if let Err(err) = connected {
            compositor.disconnect();
            return Err(err);
        }

        info!("Window opened");
        Ok(Self {
            compositor,
            presenter,
            reporter,
            open: true,
        })
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn should_close(&self) -> bool {
        !self.open || self.compositor.should_close()
    }

    /// Asks the loop to stop after the current iteration.
    pub fn request_close(&mut self) {
        self.compositor.close_window();
    }

    /// Runs iterations until the window is asked to close.
    pub fn run(&mut self) -> Result<(), WindowError> {
        while !self.should_close() {
            self.step()?;
        }
        info!("Window loop finished");
        Ok(())
    }

    /// One loop iteration: apply a negotiated resize, render one frame,
    /// then pump compositor events.
    ///
    /// Render failures go through the problem reporter first; only those it
    /// escalates end the loop, wrapped in [`WindowError::Reported`].
    pub fn step(&mut self) -> Result<(), WindowError> {
        if !self.open {
            return Err(WindowError::Closed);
        }

        if let Some(extent) = self.compositor.pending_resize() {
            self.presenter.resize(extent)?;
            self.compositor.complete_resize();
        }

        match self.presenter.render_frame() {
            Ok(FrameOutcome::Presented { image_index }) => {
                tracing::trace!(image_index, "Frame presented");
            }
            Ok(FrameOutcome::Recreated) => debug!("Swapchain recreated during frame"),
            Err(err) => {
                let problem = Problem::from_error(&err);
                match self.reporter.report(&problem) {
                    Escalation::Continue => warn!("Skipping frame: {err}"),
                    Escalation::Fatal => return Err(WindowError::Reported(Box::new(err))),
                }
            }
        }

        self.compositor.sync()
    }

    /// Tears down the presenter, then the compositor. Safe to call more
    /// than once.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.presenter.disconnect();
        self.compositor.disconnect();
        info!("Window closed");
    }
}

impl<C: Compositor, P: Presenter> Drop for Window<C, P> {
    fn drop(&mut self) {
        self.close();
    }
}
