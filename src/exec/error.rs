// ABOUTME: Process execution errors with SNAFU pattern.
// ABOUTME: Covers spawn failures, timeouts, and interruption of a child process.

use snafu::Snafu;
use std::time::Duration;

/// Failure to obtain an exit status from an external command.
///
/// A command that ran and exited non-zero is not an error at this layer; the
/// caller decides what a non-zero exit means.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExecError {
    #[snafu(display("failed to start `{program}`: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("`{program}` timed out after {}s", after.as_secs()))]
    Timeout { program: String, after: Duration },

    #[snafu(display("`{program}` was interrupted"))]
    Interrupted { program: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecErrorKind {
    Spawn,
    Timeout,
    Interrupted,
}

impl ExecError {
    pub fn kind(&self) -> ExecErrorKind {
        match self {
            ExecError::Spawn { .. } => ExecErrorKind::Spawn,
            ExecError::Timeout { .. } => ExecErrorKind::Timeout,
            ExecError::Interrupted { .. } => ExecErrorKind::Interrupted,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.kind() == ExecErrorKind::Interrupted
    }
}
