// ABOUTME: State transition methods for rolling an environment back to a known version.
// ABOUTME: Containers are fatal; infrastructure, notebooks, and models are best effort.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::deploy::{
    DeployError, StepResultExt, check_health, import_notebooks, persisted_outputs, publish_record,
};
use crate::report::{
    DeploymentRecord, Phase, PhaseLog, PhaseResult, RecordKind, Warning, WarningKind,
};
use crate::tools::{PlanOutcome, Toolchain, parse_tag_list};
use crate::types::{DeploymentTag, Environment, EnvironmentTargets, ImageRef};

use super::state::{
    Confirmed, ContainersRolledBack, InfraChecked, ModelsRolledBack, NotebooksRolledBack,
    Reported, VersionVerified, Verified,
};

/// A rollback in progress, parameterized by its current state.
#[derive(Debug)]
pub struct Rollback<S> {
    environment: Environment,
    version: DeploymentTag,
    targets: EnvironmentTargets,
    log: PhaseLog,
    started_at: DateTime<Utc>,
    infrastructure: Option<String>,
    state: S,
}

impl Rollback<Confirmed> {
    /// Start a rollback of `environment` to `version`.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::RollbackCancelled` for production unless the
    /// operator confirmed.
    pub fn new(
        environment: Environment,
        version: DeploymentTag,
        targets: EnvironmentTargets,
        confirmed: bool,
    ) -> Result<Self, DeployError> {
        if environment.is_production() && !confirmed {
            return Err(DeployError::RollbackCancelled);
        }

        let mut log = PhaseLog::default();
        log.record(PhaseResult::success(
            Phase::Resolve,
            format!(
                "roll back {} (registry {}) to {}",
                environment, targets.registry_name, version
            ),
        ));
        Ok(Rollback {
            environment,
            version,
            targets,
            log,
            started_at: Utc::now(),
            infrastructure: None,
            state: Confirmed,
        })
    }
}

impl<S> Rollback<S> {
    fn transition<T>(self, state: T) -> Rollback<T> {
        Rollback {
            environment: self.environment,
            version: self.version,
            targets: self.targets,
            log: self.log,
            started_at: self.started_at,
            infrastructure: self.infrastructure,
            state,
        }
    }

    fn checkpoint(&self, tc: &Toolchain<'_>, phase: Phase) -> Result<(), DeployError> {
        if tc.interrupt().is_triggered() {
            return Err(DeployError::interrupted(phase.as_str()));
        }
        tracing::info!(phase = %phase, "starting {}", phase.title());
        Ok(())
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn version(&self) -> &DeploymentTag {
        &self.version
    }

    pub fn log(&self) -> &PhaseLog {
        &self.log
    }

    pub fn last_result(&self) -> Option<&PhaseResult> {
        self.log.results().last()
    }

    /// Check out the rolled-back revision of `dir`. Needs the version to be
    /// a git revision as well as an image tag.
    async fn checkout(
        &self,
        tc: &Toolchain<'_>,
        dir: &Path,
        phase: Phase,
    ) -> Result<Option<Warning>, DeployError> {
        let git = &tc.config().tools.git;
        if !tc.is_available(git) {
            return Ok(Some(Warning::tool_not_found(format!(
                "{} not found on PATH; {} not restored",
                git,
                dir.display()
            ))));
        }
        tc.git()
            .checkout_path(self.version.as_str(), dir)
            .await
            .warn_on_failure(
                phase,
                &format!("git checkout {} -- {}", self.version, dir.display()),
                WarningKind::StepFailed,
            )
    }
}

// =============================================================================
// Confirmed -> VersionVerified
// =============================================================================

impl Rollback<Confirmed> {
    /// Confirm the registry holds the requested version.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::VersionNotFound` if it does not, or
    /// `DeployError::ImagePublishFailed` if tags cannot be listed.
    #[must_use = "rollback state must be used"]
    pub async fn verify_version(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Rollback<VersionVerified>, DeployError> {
        const PHASE: Phase = Phase::VersionCheck;
        self.checkpoint(tc, PHASE)?;
        let repository = &tc.config().artifacts.ingestion.repository;

        let output = tc
            .cloud()
            .list_tags(&self.targets.registry_name, repository)
            .await
            .require_success(
                PHASE,
                &format!("listing tags of {}", repository),
                DeployError::ImagePublishFailed,
            )?;

        let tags = parse_tag_list(&output.stdout);
        if !tags.iter().any(|t| t == self.version.as_str()) {
            return Err(DeployError::VersionNotFound {
                version: self.version.to_string(),
                repository: repository.clone(),
            });
        }

        self.log.record(PhaseResult::success(
            PHASE,
            format!("{} found in {}", self.version, repository),
        ));
        Ok(self.transition(VersionVerified))
    }
}

// =============================================================================
// VersionVerified -> ContainersRolledBack
// =============================================================================

impl Rollback<VersionVerified> {
    /// Re-point the floating tag of both artifacts at the requested version.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::ImagePublishFailed` on any pull, tag, or push failure.
    #[must_use = "rollback state must be used"]
    pub async fn rollback_containers(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Rollback<ContainersRolledBack>, DeployError> {
        const PHASE: Phase = Phase::ContainerRollback;
        self.checkpoint(tc, PHASE)?;
        let config = tc.config();
        let registry = &self.targets.registry_name;

        tc.cloud().registry_login(registry).await.require_success(
            PHASE,
            &format!("registry login to {}", registry),
            DeployError::ImagePublishFailed,
        )?;

        let engine = tc.container();
        let login = config.login_server(&self.targets);
        let mut repositories = Vec::new();
        for (kind, artifact) in config.artifacts.iter() {
            let pinned = ImageRef::new(&login, &artifact.repository, self.version.as_str());
            let floating = pinned.with_tag(&config.registry.floating_tag);
            tracing::info!(artifact = %kind, image = %pinned, "restoring image");

            engine.pull(&pinned).await.require_success(
                PHASE,
                &format!("pulling {}", pinned),
                DeployError::ImagePublishFailed,
            )?;
            engine.tag(&pinned, &floating).await.require_success(
                PHASE,
                &format!("tagging {}", floating),
                DeployError::ImagePublishFailed,
            )?;
            engine.push(&floating).await.require_success(
                PHASE,
                &format!("pushing {}", floating),
                DeployError::ImagePublishFailed,
            )?;
            repositories.push(artifact.repository.as_str());
        }

        self.log.record(PhaseResult::success(
            PHASE,
            format!(
                "{} now points at {} for {}",
                config.registry.floating_tag,
                self.version,
                repositories.join(", ")
            ),
        ));
        Ok(self.transition(ContainersRolledBack))
    }
}

// =============================================================================
// ContainersRolledBack -> InfraChecked
// =============================================================================

impl Rollback<ContainersRolledBack> {
    /// Plan without applying. Drift is reported for manual review.
    ///
    /// # Errors
    ///
    /// Only an interrupt is fatal here.
    #[must_use = "rollback state must be used"]
    pub async fn check_infra(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Rollback<InfraChecked>, DeployError> {
        const PHASE: Phase = Phase::InfraCheck;
        self.checkpoint(tc, PHASE)?;
        let terraform = tc.terraform(self.environment);

        if let Some(warning) =
            terraform
                .init(true)
                .await
                .warn_on_failure(PHASE, "terraform init", WarningKind::StepFailed)?
        {
            self.log.record(PhaseResult::completed(
                PHASE,
                "infrastructure not checked",
                vec![warning],
            ));
            return Ok(self.transition(InfraChecked));
        }

        let outcome = match terraform.plan(false).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_interrupted() => return Err(DeployError::interrupted(PHASE.as_str())),
            Err(e) => PlanOutcome::Error(e.to_string()),
        };

        let result = match outcome {
            PlanOutcome::NoChanges => {
                self.infrastructure = Some("no drift".to_string());
                PhaseResult::success(PHASE, "no drift")
            }
            PlanOutcome::ChangesPending => {
                self.infrastructure = Some("drift detected, not applied".to_string());
                PhaseResult::completed(
                    PHASE,
                    "drift detected, not applied",
                    vec![Warning::new(
                        WarningKind::InfraDrift,
                        format!(
                            "infrastructure for {} differs from declared state; review the plan and apply manually",
                            self.environment
                        ),
                    )],
                )
            }
            PlanOutcome::Error(msg) => PhaseResult::completed(
                PHASE,
                "infrastructure not checked",
                vec![Warning::new(
                    WarningKind::StepFailed,
                    format!("terraform plan: {}", msg),
                )],
            ),
        };
        self.log.record(result);
        Ok(self.transition(InfraChecked))
    }
}

// =============================================================================
// InfraChecked -> NotebooksRolledBack
// =============================================================================

impl Rollback<InfraChecked> {
    /// Restore notebooks from the version's revision and re-import them.
    #[must_use = "rollback state must be used"]
    pub async fn rollback_notebooks(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Rollback<NotebooksRolledBack>, DeployError> {
        const PHASE: Phase = Phase::NotebookRollback;
        self.checkpoint(tc, PHASE)?;
        let config = tc.config();

        if !tc.path(&config.databricks.notebooks_dir).is_dir() {
            self.log
                .record(PhaseResult::skipped(PHASE, "no notebooks directory"));
            return Ok(self.transition(NotebooksRolledBack));
        }

        if let Some(warning) = self
            .checkout(tc, &config.databricks.notebooks_dir, PHASE)
            .await?
        {
            self.log.record(PhaseResult::completed(
                PHASE,
                "notebooks not restored",
                vec![warning],
            ));
            return Ok(self.transition(NotebooksRolledBack));
        }

        let outputs = persisted_outputs(tc, self.environment);
        let result =
            match import_notebooks(tc, &self.targets, &outputs, &outputs.to_env(), PHASE).await? {
                Ok(detail) => PhaseResult::success(PHASE, detail),
                Err(warning) => PhaseResult::completed(
                    PHASE,
                    "notebooks checked out, not imported",
                    vec![warning],
                ),
            };
        self.log.record(result);
        Ok(self.transition(NotebooksRolledBack))
    }
}

// =============================================================================
// NotebooksRolledBack -> ModelsRolledBack
// =============================================================================

impl Rollback<NotebooksRolledBack> {
    /// Restore the dbt project from the version's revision and re-run it.
    #[must_use = "rollback state must be used"]
    pub async fn rollback_models(
        mut self,
        tc: &Toolchain<'_>,
    ) -> Result<Rollback<ModelsRolledBack>, DeployError> {
        const PHASE: Phase = Phase::ModelRollback;
        self.checkpoint(tc, PHASE)?;
        let config = tc.config();

        if !tc.path(&config.dbt.dir).is_dir() {
            self.log.record(PhaseResult::skipped(PHASE, "no dbt project"));
            return Ok(self.transition(ModelsRolledBack));
        }

        let mut warnings = Vec::new();
        if let Some(warning) = self.checkout(tc, &config.dbt.dir, PHASE).await? {
            warnings.push(warning);
            self.log.record(PhaseResult::completed(
                PHASE,
                "models not restored",
                warnings,
            ));
            return Ok(self.transition(ModelsRolledBack));
        }

        let dbt = tc
            .dbt()
            .with_env(persisted_outputs(tc, self.environment).to_env());
        if !dbt.is_available() {
            warnings.push(Warning::tool_not_found(format!(
                "{} not found on PATH; models checked out but not run",
                dbt.program()
            )));
            self.log.record(PhaseResult::completed(
                PHASE,
                "models checked out, not run",
                warnings,
            ));
            return Ok(self.transition(ModelsRolledBack));
        }

        let deps = dbt.deps().await;
        if let Some(warning) =
            deps.warn_on_failure(PHASE, "dbt deps", WarningKind::DependencyResolution)?
        {
            warnings.push(warning);
        }
        let run = dbt.run(self.environment).await;
        let detail = match run.warn_on_failure(PHASE, "dbt run", WarningKind::StepFailed)? {
            Some(warning) => {
                warnings.push(warning);
                "models checked out, run failed"
            }
            None => "models restored and run",
        };

        self.log
            .record(PhaseResult::completed(PHASE, detail, warnings));
        Ok(self.transition(ModelsRolledBack))
    }
}

// =============================================================================
// ModelsRolledBack -> Verified
// =============================================================================

impl Rollback<ModelsRolledBack> {
    /// Run the health check. Never fatal.
    #[must_use = "rollback state must be used"]
    pub async fn verify(mut self, tc: &Toolchain<'_>) -> Result<Rollback<Verified>, DeployError> {
        const PHASE: Phase = Phase::Verification;
        self.checkpoint(tc, PHASE)?;

        let result = match check_health(tc, self.environment, PHASE).await? {
            Ok(detail) => PhaseResult::success(PHASE, detail),
            Err(warning) => {
                PhaseResult::completed(PHASE, "health not confirmed", vec![warning])
            }
        };
        self.log.record(result);
        Ok(self.transition(Verified))
    }
}

// =============================================================================
// Verified -> Reported
// =============================================================================

impl Rollback<Verified> {
    /// Write the rollback record and send the notification.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::ReportFailed` if the record cannot be written.
    #[must_use = "rollback state must be used"]
    pub async fn report(mut self, tc: &Toolchain<'_>) -> Result<Rollback<Reported>, DeployError> {
        const PHASE: Phase = Phase::Report;
        self.checkpoint(tc, PHASE)?;

        let mut phases = self.log.results().to_vec();
        phases.push(PhaseResult::success(PHASE, "rollback record written"));
        let record = DeploymentRecord {
            kind: RecordKind::Rollback,
            environment: self.environment,
            version: self.version.to_string(),
            flags: None,
            targets: self.targets.clone(),
            infrastructure: self.infrastructure.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            operator_host: DeploymentRecord::operator_host(),
            phases,
            rollback_command: DeploymentRecord::rollback_command_for(
                self.environment,
                self.version.as_str(),
            ),
        };

        let (path, warnings) = publish_record(tc, &record).await?;
        self.log.record(PhaseResult::completed(
            PHASE,
            format!("report written to {}", path.display()),
            warnings,
        ));
        Ok(self.transition(Reported { report: path }))
    }
}

// =============================================================================
// Reported - Terminal State
// =============================================================================

/// What a finished rollback leaves behind.
#[derive(Debug, Clone)]
pub struct RollbackSummary {
    pub environment: Environment,
    pub version: DeploymentTag,
    pub phases: Vec<PhaseResult>,
    pub report: PathBuf,
}

impl RollbackSummary {
    pub fn warnings(&self) -> impl Iterator<Item = (Phase, &Warning)> {
        self.phases
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| (r.phase, w)))
    }
}

impl Rollback<Reported> {
    pub fn finish(self) -> RollbackSummary {
        RollbackSummary {
            phases: self.log.results().to_vec(),
            environment: self.environment,
            version: self.version,
            report: self.state.report,
        }
    }
}
