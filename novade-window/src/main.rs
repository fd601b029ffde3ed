use std::process::ExitCode;

use anyhow::Context;
use novade_core::config::ConfigLoader;
use novade_core::problem::{Escalation, Problem, ProblemReporter, TracingReporter};
use novade_core::{init_logging, init_minimal_logging};
use novade_window::{Window, WindowError};
use tracing::{error, info, warn};

/// Exit status of the original demo on any fatal startup or loop failure.
const FATAL_EXIT: u8 = 255;

fn run() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("Failed to load window configuration")?;
    if let Err(e) = init_logging(&config.logging, false) {
        init_minimal_logging();
        warn!("Falling back to minimal logging: {e}");
    }
    info!(title = %config.window.title, "Starting");

    let mut window = Window::open(&config)?;
    window.run()?;
    window.close();
    Ok(())
}

/// Reports a failure that ended [`run`], unless the window already did.
fn escalate(err: &anyhow::Error, reporter: &dyn ProblemReporter) -> Escalation {
    match err.downcast_ref::<WindowError>() {
        Some(window_error) if window_error.is_reported() => Escalation::Fatal,
        Some(window_error) => reporter.report(&Problem::from_error(window_error)),
        None => {
            error!("{err:#}");
            Escalation::Fatal
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            init_minimal_logging();
            match escalate(&err, &TracingReporter::default()) {
                Escalation::Fatal => ExitCode::from(FATAL_EXIT),
                Escalation::Continue => ExitCode::SUCCESS,
            }
        }
    }
}
