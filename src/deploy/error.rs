// ABOUTME: Fatal error taxonomy for deployment and rollback runs.
// ABOUTME: Every variant halts the run; non-fatal conditions are WarningKinds instead.

use crate::exec::{CommandOutput, ExecError};
use crate::report::{Phase, Warning, WarningKind};
use crate::types::{DeploymentTagError, InvalidEnvironment};

/// Errors that abort a deployment or rollback.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Target is not one of dev, staging, production.
    #[error(transparent)]
    InvalidEnvironment(#[from] InvalidEnvironment),

    /// Deployment tag is not a valid image tag.
    #[error("invalid deployment tag: {0}")]
    InvalidTag(#[from] DeploymentTagError),

    /// A pre-flight check failed; nothing has been changed.
    #[error("pre-flight check failed: {0}")]
    PreflightFailed(String),

    /// The pre-deploy test suite failed and --force was not given.
    #[error("tests failed: {0} (use --force to continue anyway)")]
    TestsFailed(String),

    /// Building, tagging, or pushing an image failed. The registry may hold a
    /// partial publish.
    #[error("image publish failed: {0}")]
    ImagePublishFailed(String),

    /// The provisioning tool could not produce a plan.
    #[error("infrastructure plan failed: {0}")]
    PlanFailed(String),

    /// Applying a plan failed; infrastructure may be partially changed.
    #[error("infrastructure apply failed: {0}")]
    ApplyFailed(String),

    /// Running the transformation models failed.
    #[error("transformation run failed: {0}")]
    TransformationFailed(String),

    /// Transformation tests failed after the models ran.
    #[error("transformation validation failed: {0}")]
    TransformationValidationFailed(String),

    /// Production smoke tests failed.
    #[error("smoke tests failed: {0}")]
    SmokeTestFailed(String),

    /// Requested rollback version is not in the registry.
    #[error("version '{version}' not found in repository '{repository}'")]
    VersionNotFound { version: String, repository: String },

    /// Operator declined the production deployment prompt.
    #[error("deployment to production cancelled by operator")]
    DeploymentCancelled,

    /// Operator declined the production rollback prompt.
    #[error("rollback of production cancelled by operator")]
    RollbackCancelled,

    /// An external interrupt arrived; state may be inconsistent.
    #[error("interrupted during {phase}")]
    Interrupted { phase: String },

    /// Writing the deployment record failed.
    #[error("failed to write report: {0}")]
    ReportFailed(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    InvalidEnvironment,
    InvalidTag,
    PreflightFailed,
    TestsFailed,
    ImagePublishFailed,
    PlanFailed,
    ApplyFailed,
    TransformationFailed,
    TransformationValidationFailed,
    SmokeTestFailed,
    VersionNotFound,
    DeploymentCancelled,
    RollbackCancelled,
    Interrupted,
    ReportFailed,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::InvalidEnvironment(_) => DeployErrorKind::InvalidEnvironment,
            DeployError::InvalidTag(_) => DeployErrorKind::InvalidTag,
            DeployError::PreflightFailed(_) => DeployErrorKind::PreflightFailed,
            DeployError::TestsFailed(_) => DeployErrorKind::TestsFailed,
            DeployError::ImagePublishFailed(_) => DeployErrorKind::ImagePublishFailed,
            DeployError::PlanFailed(_) => DeployErrorKind::PlanFailed,
            DeployError::ApplyFailed(_) => DeployErrorKind::ApplyFailed,
            DeployError::TransformationFailed(_) => DeployErrorKind::TransformationFailed,
            DeployError::TransformationValidationFailed(_) => {
                DeployErrorKind::TransformationValidationFailed
            }
            DeployError::SmokeTestFailed(_) => DeployErrorKind::SmokeTestFailed,
            DeployError::VersionNotFound { .. } => DeployErrorKind::VersionNotFound,
            DeployError::DeploymentCancelled => DeployErrorKind::DeploymentCancelled,
            DeployError::RollbackCancelled => DeployErrorKind::RollbackCancelled,
            DeployError::Interrupted { .. } => DeployErrorKind::Interrupted,
            DeployError::ReportFailed(_) => DeployErrorKind::ReportFailed,
        }
    }

    pub fn interrupted(phase: impl Into<String>) -> Self {
        DeployError::Interrupted {
            phase: phase.into(),
        }
    }
}

/// Extension trait for mapping process errors into a phase's fatal error.
///
/// Interruption always maps to [`DeployError::Interrupted`] regardless of the
/// phase's own error variant.
pub trait ExecErrorExt<T> {
    fn or_fatal(
        self,
        phase: &str,
        fatal: impl FnOnce(String) -> DeployError,
    ) -> Result<T, DeployError>;
}

impl<T> ExecErrorExt<T> for Result<T, ExecError> {
    fn or_fatal(
        self,
        phase: &str,
        fatal: impl FnOnce(String) -> DeployError,
    ) -> Result<T, DeployError> {
        self.map_err(|e| {
            if e.is_interrupted() {
                DeployError::interrupted(phase)
            } else {
                fatal(e.to_string())
            }
        })
    }
}

/// Extension trait for judging a finished command within a phase.
pub trait StepResultExt {
    /// Spawn errors, timeouts, and non-zero exits all become `fatal`.
    fn require_success(
        self,
        phase: Phase,
        what: &str,
        fatal: impl FnOnce(String) -> DeployError,
    ) -> Result<CommandOutput, DeployError>;

    /// Any failure becomes a warning of `kind`; only an interrupt is fatal.
    fn warn_on_failure(
        self,
        phase: Phase,
        what: &str,
        kind: WarningKind,
    ) -> Result<Option<Warning>, DeployError>;
}

impl StepResultExt for Result<CommandOutput, ExecError> {
    fn require_success(
        self,
        phase: Phase,
        what: &str,
        fatal: impl FnOnce(String) -> DeployError,
    ) -> Result<CommandOutput, DeployError> {
        match self {
            Ok(output) if output.success() => Ok(output),
            Ok(output) => Err(fatal(format!("{}: {}", what, output.failure_summary()))),
            Err(e) if e.is_interrupted() => Err(DeployError::interrupted(phase.as_str())),
            Err(e) => Err(fatal(format!("{}: {}", what, e))),
        }
    }

    fn warn_on_failure(
        self,
        phase: Phase,
        what: &str,
        kind: WarningKind,
    ) -> Result<Option<Warning>, DeployError> {
        match self {
            Ok(output) if output.success() => Ok(None),
            Ok(output) => Ok(Some(Warning::new(
                kind,
                format!("{}: {}", what, output.failure_summary()),
            ))),
            Err(e) if e.is_interrupted() => Err(DeployError::interrupted(phase.as_str())),
            Err(e) => Ok(Some(Warning::new(kind, format!("{}: {}", what, e)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecError;

    #[test]
    fn interrupted_exec_maps_to_interrupted() {
        let res: Result<(), ExecError> = Err(ExecError::Interrupted {
            program: "terraform".to_string(),
        });
        let err = res
            .or_fatal("infrastructure", DeployError::PlanFailed)
            .unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::Interrupted);
        assert_eq!(err.to_string(), "interrupted during infrastructure");
    }

    #[test]
    fn other_exec_errors_use_phase_variant() {
        let res: Result<(), ExecError> = Err(ExecError::Timeout {
            program: "docker".to_string(),
            after: std::time::Duration::from_secs(5),
        });
        let err = res
            .or_fatal("images", DeployError::ImagePublishFailed)
            .unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::ImagePublishFailed);
        assert!(err.to_string().contains("timed out after 5s"));
    }

    fn exited(code: i32, stderr: &str) -> Result<CommandOutput, ExecError> {
        Ok(CommandOutput {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn require_success_names_the_step() {
        let err = exited(1, "Error: unauthorized")
            .require_success(Phase::ImagePublish, "docker push", DeployError::ImagePublishFailed)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "image publish failed: docker push: exit code 1: Error: unauthorized"
        );
        assert!(
            exited(0, "")
                .require_success(Phase::ImagePublish, "x", DeployError::ImagePublishFailed)
                .is_ok()
        );
    }

    #[test]
    fn warn_on_failure_downgrades_everything_but_interrupts() {
        let warning = exited(2, "deps unreachable")
            .warn_on_failure(
                Phase::ApplicationDeploy,
                "dbt deps",
                WarningKind::DependencyResolution,
            )
            .unwrap()
            .unwrap();
        assert_eq!(warning.kind, WarningKind::DependencyResolution);
        assert!(warning.message.starts_with("dbt deps: exit code 2"));

        let interrupted: Result<CommandOutput, ExecError> = Err(ExecError::Interrupted {
            program: "dbt".to_string(),
        });
        let err = interrupted
            .warn_on_failure(
                Phase::ApplicationDeploy,
                "dbt deps",
                WarningKind::DependencyResolution,
            )
            .unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::Interrupted);
    }
}
