//! Problem reporting for the presentation stack.
//!
//! Components never decide on their own whether a failure ends the process.
//! They classify the failure as a [`Problem`] and push it to a
//! [`ProblemReporter`], which owns the severity-to-fatality mapping and the
//! silencing policy.
//!
//! ```rust,ignore
//! use novade_core::problem::{Problem, ProblemCode, ProblemReporter, TracingReporter, Escalation};
//!
//! let reporter = TracingReporter::default();
//! let problem = Problem::new(ProblemCode::ConnectionFailed, None, "no WAYLAND_DISPLAY");
//! if reporter.report(&problem) == Escalation::Fatal {
//!     std::process::exit(255);
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::panic::Location;

/// How serious a problem is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational only.
    Log,
    /// Worth a developer's attention, never fatal by default.
    Warning,
    /// A real failure of the operation that raised it.
    Error,
    /// The process cannot sensibly continue.
    Panic,
}

/// Classified failure codes raised by the windowing and renderer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemCode {
    /// The compositor could not be reached.
    ConnectionFailed,
    /// A required compositor global was not advertised.
    MissingGlobal,
    /// A required GPU extension/layer or window-manager capability is absent.
    MissingCapability,
    /// Enumerating extensions, layers or devices failed.
    EnumerationFailure,
    /// A component was connected twice.
    DoubleInit,
    /// The compositor reported a protocol error or the event stream broke.
    ProtocolViolation,
    /// No physical device or queue family can present to the surface.
    NoSuitableDevice,
    /// Any other GPU API failure.
    GpuFailure,
    /// A bounded wait expired. Recoverable.
    FrameStall,
    /// Configuration or logging setup failed.
    Configuration,
}

impl ProblemCode {
    /// Stable string form used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemCode::ConnectionFailed => "connection_failed",
            ProblemCode::MissingGlobal => "missing_global",
            ProblemCode::MissingCapability => "missing_capability",
            ProblemCode::EnumerationFailure => "enumeration_failure",
            ProblemCode::DoubleInit => "double_init",
            ProblemCode::ProtocolViolation => "protocol_violation",
            ProblemCode::NoSuitableDevice => "no_suitable_device",
            ProblemCode::GpuFailure => "gpu_failure",
            ProblemCode::FrameStall => "frame_stall",
            ProblemCode::Configuration => "configuration",
        }
    }

    /// Severity used when the raiser asks for it to be inferred.
    pub fn default_severity(&self) -> Severity {
        match self {
            ProblemCode::ConnectionFailed
            | ProblemCode::MissingGlobal
            | ProblemCode::MissingCapability
            | ProblemCode::ProtocolViolation
            | ProblemCode::NoSuitableDevice => Severity::Panic,
            ProblemCode::EnumerationFailure
            | ProblemCode::GpuFailure
            | ProblemCode::Configuration => Severity::Error,
            ProblemCode::DoubleInit | ProblemCode::FrameStall => Severity::Warning,
        }
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified failure.
#[derive(Debug, Clone)]
pub struct Problem {
    pub code: ProblemCode,
    pub severity: Severity,
    pub context: String,
    pub location: &'static Location<'static>,
}

impl Problem {
    /// Creates a problem raised at the caller's location.
    ///
    /// Passing `None` as severity infers it from the code.
    #[track_caller]
    pub fn new(code: ProblemCode, severity: Option<Severity>, context: impl Into<String>) -> Self {
        Self {
            code,
            severity: severity.unwrap_or_else(|| code.default_severity()),
            context: context.into(),
            location: Location::caller(),
        }
    }

    /// Classifies an error through its [`AsProblem`] implementation.
    #[track_caller]
    pub fn from_error<E: AsProblem + fmt::Display + ?Sized>(error: &E) -> Self {
        Self::new(error.problem_code(), None, error.to_string())
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}:{})",
            self.code,
            self.context,
            self.location.file(),
            self.location.line()
        )
    }
}

/// Errors that know which [`ProblemCode`] they belong to.
pub trait AsProblem {
    fn problem_code(&self) -> ProblemCode;
}

/// What the caller must do after reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Continue,
    Fatal,
}

/// Sink for classified problems.
pub trait ProblemReporter {
    fn report(&self, problem: &Problem) -> Escalation;
}

/// Reports problems through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    silenced: HashSet<ProblemCode>,
    fatal_threshold: Severity,
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self {
            silenced: HashSet::new(),
            fatal_threshold: Severity::Error,
        }
    }
}

impl TracingReporter {
    /// Drops every future problem with this code. Silenced problems never escalate.
    pub fn silence(mut self, code: ProblemCode) -> Self {
        self.silenced.insert(code);
        self
    }

    /// Lowest severity that is treated as fatal.
    pub fn fatal_at(mut self, threshold: Severity) -> Self {
        self.fatal_threshold = threshold;
        self
    }

    /// Pure escalation decision, without logging.
    pub fn escalation_for(&self, problem: &Problem) -> Escalation {
        if self.silenced.contains(&problem.code) || problem.severity < self.fatal_threshold {
            Escalation::Continue
        } else {
            Escalation::Fatal
        }
    }
}

impl ProblemReporter for TracingReporter {
    fn report(&self, problem: &Problem) -> Escalation {
        if self.silenced.contains(&problem.code) {
            return Escalation::Continue;
        }

        let file = problem.location.file();
        let line = problem.location.line();
        match problem.severity {
            Severity::Log => {
                tracing::info!(code = %problem.code, file, line, "{}", problem.context)
            }
            Severity::Warning => {
                tracing::warn!(code = %problem.code, file, line, "{}", problem.context)
            }
            Severity::Error | Severity::Panic => {
                tracing::error!(code = %problem.code, severity = ?problem.severity, file, line, "{}", problem.context)
            }
        }

        self.escalation_for(problem)
    }
}
