// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::report::{Phase, PhaseResult, PhaseStatus, WarningKind};
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Announce that a phase is starting.
    pub fn phase_started(&self, phase: Phase) {
        self.progress(&format!("  → {}...", phase.title()));
    }

    /// Print a finished phase and its warnings.
    pub fn phase_finished(&self, result: &PhaseResult) {
        match self.mode {
            OutputMode::Normal => {
                let mark = match result.status {
                    PhaseStatus::Success => "✓",
                    PhaseStatus::Warning => "!",
                    PhaseStatus::Failed => "✗",
                    PhaseStatus::Skipped => "-",
                };
                println!("  {} {}: {}", mark, result.phase.title(), result.detail);
                for warning in &result.warnings {
                    let flag = if warning.is_degraded_skip() {
                        " [degraded]"
                    } else {
                        ""
                    };
                    println!("      warning{}: {}", flag, warning.message);
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let event = PhaseEventJson {
                    event: "phase",
                    phase: result.phase.as_str(),
                    status: result.status,
                    detail: &result.detail,
                    warnings: result
                        .warnings
                        .iter()
                        .map(|w| WarningJson {
                            kind: w.kind,
                            message: &w.message,
                            degraded: w.is_degraded_skip(),
                        })
                        .collect(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => self.emit_json("success", message, false),
        }
    }

    /// Print an operator cancellation.
    pub fn cancelled(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Cancelled: {message}"),
            OutputMode::Json => self.emit_json("cancelled", message, true),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => self.emit_json("error", message, true),
        }
    }

    fn emit_json(&self, event: &str, message: &str, to_stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.duration(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if to_stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct PhaseEventJson<'a> {
    event: &'a str,
    phase: &'a str,
    status: PhaseStatus,
    detail: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<WarningJson<'a>>,
}

#[derive(Serialize)]
struct WarningJson<'a> {
    kind: WarningKind,
    message: &'a str,
    degraded: bool,
}
