// ABOUTME: Post-deploy verification: the health-check script and the smoke-test suite.
// ABOUTME: Health-check exit codes: 0 healthy, 2 degraded, anything else unhealthy.

use super::Toolchain;
use crate::exec::{CommandOutput, CommandSpec, ExecError};
use crate::types::Environment;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn from_output(output: &CommandOutput) -> Self {
        match output.exit_code {
            Some(0) => HealthStatus::Healthy,
            Some(2) => HealthStatus::Degraded(output.failure_summary()),
            _ => HealthStatus::Unhealthy(output.failure_summary()),
        }
    }
}

pub struct HealthCheck<'a> {
    tc: Toolchain<'a>,
}

impl<'a> HealthCheck<'a> {
    pub fn new(tc: Toolchain<'a>) -> Self {
        Self { tc }
    }

    pub fn script(&self) -> PathBuf {
        self.tc.path(&self.tc.config().verification.health_check)
    }

    pub fn smoke_tests_dir(&self) -> PathBuf {
        self.tc.path(&self.tc.config().verification.smoke_tests)
    }

    fn python(&self) -> CommandSpec {
        CommandSpec::new(&self.tc.config().tools.python)
    }

    pub async fn check(&self, env: Environment) -> Result<HealthStatus, ExecError> {
        let spec = self
            .python()
            .arg(self.script().display().to_string())
            .args(["--environment", env.as_str()])
            .timeout(self.tc.config().timeouts.health_check);
        let output = self.tc.run(spec).await?;
        Ok(HealthStatus::from_output(&output))
    }

    /// Run the smoke suite against `env`, exposed to the tests as
    /// `DEPLOY_ENVIRONMENT`.
    pub async fn smoke_tests(&self, env: Environment) -> Result<CommandOutput, ExecError> {
        let spec = self
            .python()
            .args(["-m", "pytest"])
            .arg(self.smoke_tests_dir().display().to_string())
            .arg("-q")
            .env("DEPLOY_ENVIRONMENT", env.as_str())
            .timeout(self.tc.config().timeouts.tests);
        self.tc.run(spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit(code: i32) -> CommandOutput {
        CommandOutput {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: "storage: slow".to_string(),
        }
    }

    #[test]
    fn exit_codes_map_to_health() {
        assert_eq!(HealthStatus::from_output(&exit(0)), HealthStatus::Healthy);
        assert!(matches!(
            HealthStatus::from_output(&exit(2)),
            HealthStatus::Degraded(ref m) if m.contains("storage: slow")
        ));
        assert!(matches!(
            HealthStatus::from_output(&exit(1)),
            HealthStatus::Unhealthy(_)
        ));
    }
}
