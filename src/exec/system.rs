// ABOUTME: CommandRunner backed by real child processes via tokio::process.
// ABOUTME: Captures output, enforces timeouts, and kills children on interrupt.

use super::error::{ExecError, InterruptedSnafu, SpawnSnafu, TimeoutSnafu};
use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::interrupt::Interrupt;
use async_trait::async_trait;
use snafu::ResultExt;
use std::process::Stdio;
use tokio::process::Command;

/// Runs commands as child processes of the orchestrator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        interrupt: &Interrupt,
    ) -> Result<CommandOutput, ExecError> {
        if interrupt.is_triggered() {
            return InterruptedSnafu {
                program: spec.program.clone(),
            }
            .fail();
        }

        tracing::debug!(command = %spec, "running external command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = spec.current_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().context(SpawnSnafu {
            program: spec.program.clone(),
        })?;

        // Dropping the wait future on timeout or interrupt kills the child.
        let wait = child.wait_with_output();
        let output = match spec.timeout {
            Some(limit) => tokio::select! {
                res = tokio::time::timeout(limit, wait) => match res {
                    Ok(res) => res,
                    Err(_) => {
                        return TimeoutSnafu { program: spec.program.clone(), after: limit }.fail();
                    }
                },
                _ = interrupt.triggered() => {
                    return InterruptedSnafu { program: spec.program.clone() }.fail();
                }
            },
            None => tokio::select! {
                res = wait => res,
                _ = interrupt.triggered() => {
                    return InterruptedSnafu { program: spec.program.clone() }.fail();
                }
            },
        }
        .context(SpawnSnafu {
            program: spec.program.clone(),
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if result.success() {
            tracing::debug!(command = %spec, "command succeeded");
        } else {
            tracing::debug!(command = %spec, exit_code = ?result.exit_code, "command failed");
        }

        Ok(result)
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hello; exit 3"]);
        let output = SystemRunner.run(&spec, &Interrupt::new()).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn passes_scoped_environment() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s' \"$LAKESHIP_TEST_VALUE\""])
            .env("LAKESHIP_TEST_VALUE", "scoped");
        let output = SystemRunner.run(&spec, &Interrupt::new()).await.unwrap();

        assert_eq!(output.stdout, "scoped");
        assert!(std::env::var("LAKESHIP_TEST_VALUE").is_err());
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-lakeship");
        let err = SystemRunner.run(&spec, &Interrupt::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::exec::ExecErrorKind::Spawn);
    }

    #[tokio::test]
    async fn timeout_kills_slow_command() {
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(50));
        let err = SystemRunner.run(&spec, &Interrupt::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::exec::ExecErrorKind::Timeout);
    }

    #[tokio::test]
    async fn interrupt_stops_running_command() {
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let spec = CommandSpec::new("sleep").arg("5");
        let err = SystemRunner.run(&spec, &interrupt).await.unwrap_err();
        assert!(err.is_interrupted());
    }

    #[test]
    fn resolves_shell_on_path() {
        assert!(SystemRunner.is_available("sh"));
        assert!(!SystemRunner.is_available("definitely-not-a-real-binary-lakeship"));
    }
}
