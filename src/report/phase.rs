// ABOUTME: Phase results and the append-only log that forms a run's audit trail.
// ABOUTME: Collects non-fatal warnings per phase instead of failing the run.

use serde::Serialize;
use std::fmt;

/// A step of the deploy or rollback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resolve,
    Preflight,
    Tests,
    ImagePublish,
    InfraConvergence,
    ApplicationDeploy,
    Verification,
    Report,
    VersionCheck,
    ContainerRollback,
    InfraCheck,
    NotebookRollback,
    ModelRollback,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Resolve => "resolve",
            Phase::Preflight => "preflight",
            Phase::Tests => "tests",
            Phase::ImagePublish => "image_publish",
            Phase::InfraConvergence => "infra_convergence",
            Phase::ApplicationDeploy => "application_deploy",
            Phase::Verification => "verification",
            Phase::Report => "report",
            Phase::VersionCheck => "version_check",
            Phase::ContainerRollback => "container_rollback",
            Phase::InfraCheck => "infra_check",
            Phase::NotebookRollback => "notebook_rollback",
            Phase::ModelRollback => "model_rollback",
        }
    }

    /// Human-readable title used in reports.
    pub fn title(&self) -> &'static str {
        match self {
            Phase::Resolve => "Resolve environment",
            Phase::Preflight => "Pre-flight checks",
            Phase::Tests => "Test suite",
            Phase::ImagePublish => "Build and push images",
            Phase::InfraConvergence => "Infrastructure convergence",
            Phase::ApplicationDeploy => "Application deployment",
            Phase::Verification => "Verification",
            Phase::Report => "Report",
            Phase::VersionCheck => "Verify rollback version",
            Phase::ContainerRollback => "Roll back containers",
            Phase::InfraCheck => "Infrastructure drift check",
            Phase::NotebookRollback => "Roll back notebooks",
            Phase::ModelRollback => "Roll back dbt models",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Success,
    Warning,
    Failed,
    Skipped,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStatus::Success => write!(f, "success"),
            PhaseStatus::Warning => write!(f, "warning"),
            PhaseStatus::Failed => write!(f, "failed"),
            PhaseStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A non-fatal problem recorded during a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self::new(WarningKind::MissingCredential, message)
    }

    pub fn tool_not_found(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ToolNotFound, message)
    }

    pub fn notification_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::NotificationFailed, message)
    }

    /// Whether real work was skipped because something was absent.
    pub fn is_degraded_skip(&self) -> bool {
        matches!(
            self.kind,
            WarningKind::MissingCredential | WarningKind::ToolNotFound
        )
    }
}

/// Categories of non-fatal conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Credential for a best-effort integration is absent; work skipped.
    MissingCredential,
    /// External tool for a best-effort integration is absent; work skipped.
    ToolNotFound,
    /// Outbound notification could not be delivered.
    NotificationFailed,
    /// Infrastructure code is not canonically formatted.
    FormatDrift,
    /// Tests failed but --force let the run continue.
    TestsForced,
    /// Health check reported degraded or unhealthy.
    HealthDegraded,
    /// Infrastructure differs from declared state and was left for review.
    InfraDrift,
    /// Dependency resolution for the transformation project failed.
    DependencyResolution,
    /// A best-effort step ran and failed.
    StepFailed,
}

/// Outcome of one phase. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl PhaseResult {
    pub fn success(phase: Phase, detail: impl Into<String>) -> Self {
        Self::with_status(phase, PhaseStatus::Success, detail)
    }

    pub fn skipped(phase: Phase, detail: impl Into<String>) -> Self {
        Self::with_status(phase, PhaseStatus::Skipped, detail)
    }

    pub fn failed(phase: Phase, detail: impl Into<String>) -> Self {
        Self::with_status(phase, PhaseStatus::Failed, detail)
    }

    /// Success, downgraded to Warning if any warnings were collected.
    pub fn completed(phase: Phase, detail: impl Into<String>, warnings: Vec<Warning>) -> Self {
        let status = if warnings.is_empty() {
            PhaseStatus::Success
        } else {
            PhaseStatus::Warning
        };
        Self {
            phase,
            status,
            detail: detail.into(),
            warnings,
        }
    }

    fn with_status(phase: Phase, status: PhaseStatus, detail: impl Into<String>) -> Self {
        Self {
            phase,
            status,
            detail: detail.into(),
            warnings: Vec::new(),
        }
    }
}

/// Ordered, append-only record of phase outcomes for one run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PhaseLog {
    results: Vec<PhaseResult>,
}

impl PhaseLog {
    /// Append a result, logging it and each warning via tracing.
    pub fn record(&mut self, result: PhaseResult) {
        for warning in &result.warnings {
            if warning.is_degraded_skip() {
                tracing::warn!(
                    phase = %result.phase,
                    kind = ?warning.kind,
                    degraded = true,
                    "SKIPPED: {}",
                    warning.message
                );
            } else {
                tracing::warn!(phase = %result.phase, kind = ?warning.kind, "{}", warning.message);
            }
        }
        tracing::info!(phase = %result.phase, status = %result.status, "{}", result.detail);
        self.results.push(result);
    }

    pub fn results(&self) -> &[PhaseResult] {
        &self.results
    }

    pub fn get(&self, phase: Phase) -> Option<&PhaseResult> {
        self.results.iter().find(|r| r.phase == phase)
    }

    pub fn warnings(&self) -> impl Iterator<Item = (Phase, &Warning)> {
        self.results
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| (r.phase, w)))
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }
}
