// ABOUTME: Seam between the orchestrator and the external CLIs it drives.
// ABOUTME: Defines CommandSpec, CommandOutput, and the CommandRunner trait.

mod error;
mod system;

pub use error::{ExecError, ExecErrorKind, InterruptedSnafu, SpawnSnafu, TimeoutSnafu};
pub use system::SystemRunner;

use crate::interrupt::Interrupt;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra variables for the child only; the orchestrator's environment is
    /// never modified.
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (k, v) in vars {
            self.env.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// True if `program` matches and every token appears in the arguments.
    pub fn matches(&self, program: &str, tokens: &[&str]) -> bool {
        self.program == program && tokens.iter().all(|t| self.args.iter().any(|a| a == t))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last non-empty line of stderr (falling back to stdout), for messages.
    pub fn failure_summary(&self) -> String {
        let last_line = |s: &str| {
            s.lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
        };
        let code = match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        match last_line(&self.stderr).or_else(|| last_line(&self.stdout)) {
            Some(line) => format!("{}: {}", code, line),
            None => code,
        }
    }
}

/// Runs external commands on behalf of the phases.
///
/// The production implementation is [`SystemRunner`]; tests substitute a
/// scripted runner so that no real tool is ever invoked.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, racing it against `interrupt`.
    async fn run(&self, spec: &CommandSpec, interrupt: &Interrupt)
    -> Result<CommandOutput, ExecError>;

    /// Whether `program` can be resolved to an executable.
    fn is_available(&self, program: &str) -> bool;
}
