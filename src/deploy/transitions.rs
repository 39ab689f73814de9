// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self, runs one phase, and returns the next state on success.

use std::path::PathBuf;

use chrono::Utc;

use crate::exec::CommandSpec;
use crate::infra_outputs::InfrastructureOutputs;
use crate::report::{
    DeploymentRecord, NotificationPayload, Phase, PhaseResult, RecordKind, Warning, WarningKind,
    notify,
};
use crate::tools::{Databricks, HealthStatus, PlanOutcome, Toolchain};
use crate::types::{Environment, EnvironmentTargets, ImageRef};

use super::Deployment;
use super::context::DeploymentContext;
use super::error::{DeployError, ExecErrorExt, StepResultExt};
use super::state::{
    ApplicationDeployed, ImagesPublished, InfraConverged, Preflighted, Reported, Resolved, Tested,
    Verified,
};

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    /// Internal helper to transition to a new state.
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            context: self.context,
            log: self.log,
            started_at: self.started_at,
            infrastructure: self.infrastructure,
            state,
        }
    }

    /// Fail fast if an interrupt arrived before `phase` starts.
    fn checkpoint(&self, tc: &Toolchain<'_>, phase: Phase) -> Result<(), DeployError> {
        if tc.interrupt().is_triggered() {
            return Err(DeployError::interrupted(phase.as_str()));
        }
        tracing::info!(phase = %phase, "starting {}", phase.title());
        Ok(())
    }
}

/// Every image reference a publish produces, in push order.
pub fn planned_images(context: &DeploymentContext, tc: &Toolchain<'_>) -> Vec<ImageRef> {
    let config = tc.config();
    let login = config.login_server(context.targets());
    let mut images = Vec::new();
    for (_, artifact) in config.artifacts.iter() {
        let image = ImageRef::new(&login, &artifact.repository, context.tag().as_str());
        if !context.environment().is_production() {
            images.push(image.clone());
            images.push(image.with_tag(&config.registry.floating_tag));
        } else {
            images.push(image);
        }
    }
    images
}

fn join_images(images: &[ImageRef]) -> String {
    images
        .iter()
        .map(ImageRef::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Resolved -> Preflighted
// =============================================================================

impl Deployment<Resolved> {
    /// Verify the project, tools, cloud session, and infrastructure code.
    ///
    /// Read-only; also runs for dry runs.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::PreflightFailed` on the first failing check.
    #[must_use = "deployment state must be used"]
    pub async fn preflight(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Deployment<Preflighted>, DeployError> {
        const PHASE: Phase = Phase::Preflight;
        self.checkpoint(tc, PHASE)?;
        let config = tc.config();
        let flags = self.context.flags();
        let mut warnings = Vec::new();

        let marker = tc.path(&config.project.marker);
        if !marker.is_file() {
            return Err(DeployError::PreflightFailed(format!(
                "{} not found; run from the project root or pass --project-dir",
                marker.display()
            )));
        }

        let missing: Vec<&str> = config
            .tools
            .required
            .iter()
            .map(String::as_str)
            .filter(|tool| flags.build_images || *tool != config.tools.container)
            .filter(|tool| !tc.is_available(tool))
            .collect();
        if !missing.is_empty() {
            return Err(DeployError::PreflightFailed(format!(
                "required tools not found on PATH: {}",
                missing.join(", ")
            )));
        }

        tc.cloud()
            .account_show()
            .await
            .require_success(PHASE, "cloud CLI is not logged in", DeployError::PreflightFailed)?;

        let terraform = tc.terraform(self.context.environment());
        let var_file = terraform
            .dir()
            .join(config.terraform.var_file(self.context.environment()));
        if !var_file.is_file() {
            return Err(DeployError::PreflightFailed(format!(
                "variable file {} not found",
                var_file.display()
            )));
        }

        terraform
            .init(false)
            .await
            .require_success(PHASE, "terraform init", DeployError::PreflightFailed)?;
        terraform
            .validate()
            .await
            .require_success(PHASE, "terraform validate", DeployError::PreflightFailed)?;
        if let Some(warning) = terraform.fmt_check().await.warn_on_failure(
            PHASE,
            "terraform files are not canonically formatted",
            WarningKind::FormatDrift,
        )? {
            warnings.push(warning);
        }

        self.log
            .record(PhaseResult::completed(PHASE, "all checks passed", warnings));
        Ok(self.transition(Preflighted))
    }
}

// =============================================================================
// Preflighted -> Tested
// =============================================================================

impl Deployment<Preflighted> {
    /// Run the pre-deploy test commands.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::TestsFailed` if a command fails and `--force` was
    /// not given.
    #[must_use = "deployment state must be used"]
    pub async fn run_tests(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Deployment<Tested>, DeployError> {
        const PHASE: Phase = Phase::Tests;
        self.checkpoint(tc, PHASE)?;
        let flags = self.context.flags();
        let commands = &tc.config().tests.commands;

        if flags.skip_tests {
            self.log
                .record(PhaseResult::skipped(PHASE, "--skip-tests given"));
            return Ok(self.transition(Tested));
        }

        if flags.dry_run {
            let planned: Vec<String> = commands.iter().map(|c| c.join(" ")).collect();
            self.log.record(PhaseResult::skipped(
                PHASE,
                format!("dry run: would run {}", planned.join("; ")),
            ));
            return Ok(self.transition(Tested));
        }

        let mut warnings = Vec::new();
        for argv in commands {
            let Some((program, args)) = argv.split_first() else {
                continue;
            };
            let spec = CommandSpec::new(program)
                .args(args.iter().cloned())
                .timeout(tc.config().timeouts.tests);
            let what = argv.join(" ");
            let result = tc.run(spec).await;

            if flags.force {
                if let Some(warning) =
                    result.warn_on_failure(PHASE, &what, WarningKind::TestsForced)?
                {
                    warnings.push(warning);
                }
            } else {
                result.require_success(PHASE, &what, DeployError::TestsFailed)?;
            }
        }

        let detail = if warnings.is_empty() {
            format!("{} test command(s) passed", commands.len())
        } else {
            format!(
                "{} of {} test command(s) failed, continuing because of --force",
                warnings.len(),
                commands.len()
            )
        };
        self.log
            .record(PhaseResult::completed(PHASE, detail, warnings));
        Ok(self.transition(Tested))
    }
}

// =============================================================================
// Tested -> ImagesPublished
// =============================================================================

impl Deployment<Tested> {
    /// Build and push both artifacts, re-pointing the floating tag outside
    /// production.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::ImagePublishFailed` on any failure. Images pushed
    /// before the failure stay in the registry.
    #[must_use = "deployment state must be used"]
    pub async fn publish_images(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Deployment<ImagesPublished>, DeployError> {
        const PHASE: Phase = Phase::ImagePublish;
        self.checkpoint(tc, PHASE)?;
        let config = tc.config();
        let flags = self.context.flags();
        let images = planned_images(&self.context, tc);

        if !flags.build_images {
            self.log
                .record(PhaseResult::skipped(PHASE, "--no-build given"));
            return Ok(self.transition(ImagesPublished));
        }

        if flags.dry_run {
            self.log.record(PhaseResult::skipped(
                PHASE,
                format!("dry run: would publish {}", join_images(&images)),
            ));
            return Ok(self.transition(ImagesPublished));
        }

        let registry = &self.context.targets().registry_name;
        tc.cloud()
            .registry_login(registry)
            .await
            .require_success(
                PHASE,
                &format!("registry login to {}", registry),
                DeployError::ImagePublishFailed,
            )?;

        let engine = tc.container();
        let login = config.login_server(self.context.targets());
        for (kind, artifact) in config.artifacts.iter() {
            let image = ImageRef::new(&login, &artifact.repository, self.context.tag().as_str());
            tracing::info!(artifact = %kind, image = %image, "publishing image");

            engine.build(artifact, &image).await.require_success(
                PHASE,
                &format!("building {} image", kind),
                DeployError::ImagePublishFailed,
            )?;
            engine.push(&image).await.require_success(
                PHASE,
                &format!("pushing {}", image),
                DeployError::ImagePublishFailed,
            )?;

            if !self.context.environment().is_production() {
                let floating = image.with_tag(&config.registry.floating_tag);
                engine.tag(&image, &floating).await.require_success(
                    PHASE,
                    &format!("tagging {}", floating),
                    DeployError::ImagePublishFailed,
                )?;
                engine.push(&floating).await.require_success(
                    PHASE,
                    &format!("pushing {}", floating),
                    DeployError::ImagePublishFailed,
                )?;
            }
        }

        self.log.record(PhaseResult::success(
            PHASE,
            format!("published {}", join_images(&images)),
        ));
        Ok(self.transition(ImagesPublished))
    }
}

// =============================================================================
// ImagesPublished -> InfraConverged
// =============================================================================

impl Deployment<ImagesPublished> {
    /// Plan, apply only when changes are pending, and capture outputs.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::PlanFailed` if no plan can be produced, or
    /// `DeployError::ApplyFailed` if applying it fails.
    #[must_use = "deployment state must be used"]
    pub async fn converge_infra(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Deployment<InfraConverged>, DeployError> {
        const PHASE: Phase = Phase::InfraConvergence;
        self.checkpoint(tc, PHASE)?;
        let env = self.context.environment();
        let terraform = tc.terraform(env);

        terraform
            .init(true)
            .await
            .require_success(PHASE, "terraform init", DeployError::PlanFailed)?;

        let dry_run = self.context.flags().dry_run;
        let outcome = terraform
            .plan(!dry_run)
            .await
            .or_fatal(PHASE.as_str(), DeployError::PlanFailed)?;
        tracing::info!(outcome = outcome.describe(), "terraform plan finished");

        if dry_run {
            let detail = match outcome {
                PlanOutcome::NoChanges => "dry run: plan shows no changes",
                PlanOutcome::ChangesPending => "dry run: plan has pending changes",
                PlanOutcome::Error(msg) => return Err(DeployError::PlanFailed(msg)),
            };
            self.log.record(PhaseResult::success(PHASE, detail));
            return Ok(self.transition(InfraConverged::default()));
        }

        let summary = match outcome {
            PlanOutcome::NoChanges => "no changes",
            PlanOutcome::ChangesPending => {
                terraform.apply().await.require_success(
                    PHASE,
                    "terraform apply",
                    DeployError::ApplyFailed,
                )?;
                "changes applied"
            }
            PlanOutcome::Error(msg) => return Err(DeployError::PlanFailed(msg)),
        };

        let mut warnings = Vec::new();
        let outputs = match capture_outputs(tc, &terraform, env).await? {
            Ok(outputs) => outputs,
            Err(warning) => {
                warnings.push(warning);
                InfrastructureOutputs::default()
            }
        };

        self.infrastructure = Some(summary.to_string());
        self.log.record(PhaseResult::completed(
            PHASE,
            format!("{} ({} outputs captured)", summary, outputs.len()),
            warnings,
        ));
        Ok(self.transition(InfraConverged { outputs }))
    }
}

/// Read `terraform output -json` and persist it. Anything short of an
/// interrupt only costs the outputs.
async fn capture_outputs(
    tc: &Toolchain<'_>,
    terraform: &crate::tools::Terraform<'_>,
    env: Environment,
) -> Result<Result<InfrastructureOutputs, Warning>, DeployError> {
    const PHASE: Phase = Phase::InfraConvergence;
    let result = terraform.output_json().await;
    let output = match result {
        Ok(output) if output.success() => output,
        other => {
            let warning = other
                .warn_on_failure(PHASE, "terraform output", WarningKind::StepFailed)?
                .unwrap_or_else(|| {
                    Warning::new(WarningKind::StepFailed, "terraform output produced nothing")
                });
            return Ok(Err(warning));
        }
    };

    let outputs = match InfrastructureOutputs::from_terraform_json(&output.stdout) {
        Ok(outputs) => outputs,
        Err(e) => {
            return Ok(Err(Warning::new(
                WarningKind::StepFailed,
                format!("terraform outputs unreadable: {}", e),
            )));
        }
    };

    let path = tc.path(&tc.config().terraform.outputs_file(env));
    if let Err(e) = outputs.save(&path) {
        return Ok(Err(Warning::new(
            WarningKind::StepFailed,
            format!("could not write {}: {}", path.display(), e),
        )));
    }
    tracing::debug!("saved {} outputs to {}", outputs.len(), path.display());
    Ok(Ok(outputs))
}

// =============================================================================
// InfraConverged -> ApplicationDeployed
// =============================================================================

impl Deployment<InfraConverged> {
    /// Import notebooks and run the transformation project.
    ///
    /// Notebook import is best effort. Missing tools or credentials become
    /// warnings flagged as degraded skips.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::TransformationFailed` or
    /// `DeployError::TransformationValidationFailed` when the models fail.
    #[must_use = "deployment state must be used"]
    pub async fn deploy_application(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Deployment<ApplicationDeployed>, DeployError> {
        const PHASE: Phase = Phase::ApplicationDeploy;
        self.checkpoint(tc, PHASE)?;
        let config = tc.config();
        let env = self.context.environment();

        if self.context.flags().dry_run {
            self.log.record(PhaseResult::skipped(
                PHASE,
                format!(
                    "dry run: would import {} to {} and run dbt models for {}",
                    config.databricks.notebooks_dir.display(),
                    config.databricks.workspace_path,
                    env
                ),
            ));
            return Ok(self.transition(ApplicationDeployed));
        }

        let mut outputs = self.state.outputs.clone();
        outputs.merge_missing(&persisted_outputs(tc, env));
        let child_env = outputs.to_env();

        let mut warnings = Vec::new();
        let mut details = Vec::new();

        match import_notebooks(tc, self.context.targets(), &outputs, &child_env, PHASE).await? {
            Ok(detail) => details.push(detail),
            Err(warning) => warnings.push(warning),
        }

        let dbt = tc.dbt().with_env(child_env);
        if !dbt.dir().is_dir() {
            details.push("no dbt project".to_string());
        } else if !dbt.is_available() {
            warnings.push(Warning::tool_not_found(format!(
                "{} not found on PATH; dbt models not deployed",
                dbt.program()
            )));
        } else {
            let deps = dbt.deps().await;
            if let Some(warning) =
                deps.warn_on_failure(PHASE, "dbt deps", WarningKind::DependencyResolution)?
            {
                warnings.push(warning);
            }
            dbt.run(env)
                .await
                .require_success(PHASE, "dbt run", DeployError::TransformationFailed)?;
            dbt.test(env).await.require_success(
                PHASE,
                "dbt test",
                DeployError::TransformationValidationFailed,
            )?;
            details.push(format!("dbt models run and tested against {}", env));
        }

        let detail = if details.is_empty() {
            "nothing deployed".to_string()
        } else {
            details.join("; ")
        };
        self.log
            .record(PhaseResult::completed(PHASE, detail, warnings));
        Ok(self.transition(ApplicationDeployed))
    }
}

/// Outputs saved by the last successful convergence, or none.
pub(crate) fn persisted_outputs(tc: &Toolchain<'_>, env: Environment) -> InfrastructureOutputs {
    let path = tc.path(&tc.config().terraform.outputs_file(env));
    match InfrastructureOutputs::load(&path) {
        Ok(Some(outputs)) => outputs,
        Ok(None) => InfrastructureOutputs::default(),
        Err(e) => {
            tracing::warn!("ignoring {}: {}", path.display(), e);
            InfrastructureOutputs::default()
        }
    }
}

/// Import notebooks if the CLI, the token, and the workspace host are all
/// present. `Ok(Err(_))` is a warning; only an interrupt is fatal.
pub(crate) async fn import_notebooks(
    tc: &Toolchain<'_>,
    targets: &EnvironmentTargets,
    outputs: &InfrastructureOutputs,
    child_env: &std::collections::BTreeMap<String, String>,
    phase: Phase,
) -> Result<Result<String, Warning>, DeployError> {
    let config = tc.config();
    let cli = &config.tools.databricks;
    if !tc.is_available(cli) {
        return Ok(Err(Warning::tool_not_found(format!(
            "{} CLI not found on PATH; notebooks not deployed",
            cli
        ))));
    }

    let secret = &targets.secret_var_name;
    let Some(token) = std::env::var(secret).ok().filter(|t| !t.is_empty()) else {
        return Ok(Err(Warning::missing_credential(format!(
            "{} not set; notebooks not deployed",
            secret
        ))));
    };

    let Some(host) = outputs.get(&config.databricks.host_output) else {
        return Ok(Err(Warning::missing_credential(format!(
            "workspace host output '{}' unavailable; notebooks not deployed",
            config.databricks.host_output
        ))));
    };

    let databricks = Databricks::new(*tc, host, token).with_env(child_env.clone());
    if !databricks.notebooks_dir().is_dir() {
        return Ok(Ok("no notebooks to import".to_string()));
    }

    match databricks.import_notebooks().await.warn_on_failure(
        phase,
        "notebook import",
        WarningKind::StepFailed,
    )? {
        Some(warning) => Ok(Err(warning)),
        None => Ok(Ok(format!(
            "notebooks imported to {}",
            config.databricks.workspace_path
        ))),
    }
}

// =============================================================================
// ApplicationDeployed -> Verified
// =============================================================================

impl Deployment<ApplicationDeployed> {
    /// Run the health check and, unless skipped, the smoke tests.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::SmokeTestFailed` when smoke tests fail against
    /// production. Elsewhere failures are warnings.
    #[must_use = "deployment state must be used"]
    pub async fn verify(mut self, tc: &Toolchain<'_>) -> Result<Deployment<Verified>, DeployError> {
        const PHASE: Phase = Phase::Verification;
        self.checkpoint(tc, PHASE)?;
        let env = self.context.environment();

        if self.context.flags().dry_run {
            self.log.record(PhaseResult::skipped(
                PHASE,
                "dry run: health check and smoke tests not run",
            ));
            return Ok(self.transition(Verified));
        }

        let (mut details, mut warnings) = match check_health(tc, env, PHASE).await? {
            Ok(detail) => (vec![detail], Vec::new()),
            Err(warning) => (Vec::new(), vec![warning]),
        };

        let health = tc.health();
        if self.context.flags().skip_tests {
            details.push("smoke tests skipped".to_string());
        } else if health.smoke_tests_dir().is_dir() {
            let result = health.smoke_tests(env).await;
            if env.is_production() {
                result.require_success(PHASE, "smoke tests", DeployError::SmokeTestFailed)?;
                details.push("smoke tests passed".to_string());
            } else {
                match result.warn_on_failure(PHASE, "smoke tests", WarningKind::StepFailed)? {
                    Some(warning) => warnings.push(warning),
                    None => details.push("smoke tests passed".to_string()),
                }
            }
        }

        let detail = if details.is_empty() {
            "verification finished with warnings".to_string()
        } else {
            details.join("; ")
        };
        self.log
            .record(PhaseResult::completed(PHASE, detail, warnings));
        Ok(self.transition(Verified))
    }
}

/// Run the health-check script. Unhealthy results are warnings.
pub(crate) async fn check_health(
    tc: &Toolchain<'_>,
    env: Environment,
    phase: Phase,
) -> Result<Result<String, Warning>, DeployError> {
    let health = tc.health();
    let script = health.script();
    if !script.is_file() {
        return Ok(Err(Warning::tool_not_found(format!(
            "health check script {} not found",
            script.display()
        ))));
    }

    match health.check(env).await {
        Ok(HealthStatus::Healthy) => Ok(Ok("healthy".to_string())),
        Ok(HealthStatus::Degraded(msg)) => Ok(Err(Warning::new(
            WarningKind::HealthDegraded,
            format!("health check reported degraded: {}", msg),
        ))),
        Ok(HealthStatus::Unhealthy(msg)) => Ok(Err(Warning::new(
            WarningKind::HealthDegraded,
            format!("health check failed: {}", msg),
        ))),
        Err(e) if e.is_interrupted() => Err(DeployError::interrupted(phase.as_str())),
        Err(e) => Ok(Err(Warning::new(
            WarningKind::HealthDegraded,
            format!("health check did not run: {}", e),
        ))),
    }
}

// =============================================================================
// Verified -> Reported
// =============================================================================

impl Deployment<Verified> {
    /// Write the deployment record and send the notification.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::ReportFailed` if the record cannot be written.
    #[must_use = "deployment state must be used"]
    pub async fn report(mut self, tc: &Toolchain<'_>) -> Result<Deployment<Reported>, DeployError> {
        const PHASE: Phase = Phase::Report;
        self.checkpoint(tc, PHASE)?;

        if self.context.flags().dry_run {
            self.log
                .record(PhaseResult::skipped(PHASE, "dry run: no report written"));
            return Ok(self.transition(Reported::default()));
        }

        let mut phases = self.log.results().to_vec();
        phases.push(PhaseResult::success(PHASE, "deployment record written"));
        let record = DeploymentRecord {
            kind: RecordKind::Deployment,
            environment: self.context.environment(),
            version: self.context.tag().to_string(),
            flags: Some(self.context.flags()),
            targets: self.context.targets().clone(),
            infrastructure: self.infrastructure.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            operator_host: DeploymentRecord::operator_host(),
            phases,
            rollback_command: DeploymentRecord::rollback_command_for(
                self.context.environment(),
                self.context.tag().as_str(),
            ),
        };

        let (path, warnings) = publish_record(tc, &record).await?;
        self.log.record(PhaseResult::completed(
            PHASE,
            format!("report written to {}", path.display()),
            warnings,
        ));
        Ok(self.transition(Reported { report: Some(path) }))
    }
}

/// Write `record` into the reports directory, then notify.
pub(crate) async fn publish_record(
    tc: &Toolchain<'_>,
    record: &DeploymentRecord,
) -> Result<(PathBuf, Vec<Warning>), DeployError> {
    let config = tc.config();
    let dir = tc.path(&config.project.reports_dir);
    let path = record
        .write_to(&dir)
        .map_err(|e| DeployError::ReportFailed(format!("{}: {}", dir.display(), e)))?;
    tracing::info!(report = %path.display(), "record written");

    let mut warnings = Vec::new();
    let url = config.notifications.webhook_url();
    let payload = NotificationPayload::for_record(record, &path);
    match notify(url.as_deref(), config.timeouts.notification, &payload).await {
        Ok(true) => tracing::info!("notification sent"),
        Ok(false) => {}
        Err(warning) => warnings.push(warning),
    }
    Ok((path, warnings))
}

// =============================================================================
// Reported - Terminal State
// =============================================================================

/// What a finished deployment leaves behind.
#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub context: DeploymentContext,
    pub phases: Vec<PhaseResult>,
    pub infrastructure: Option<String>,
    pub report: Option<PathBuf>,
}

impl DeploymentSummary {
    pub fn warnings(&self) -> impl Iterator<Item = (Phase, &Warning)> {
        self.phases
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| (r.phase, w)))
    }
}

impl Deployment<Reported> {
    /// Consume the deployment and return its summary.
    pub fn finish(self) -> DeploymentSummary {
        DeploymentSummary {
            phases: self.log.results().to_vec(),
            context: self.context,
            infrastructure: self.infrastructure,
            report: self.state.report,
        }
    }
}
