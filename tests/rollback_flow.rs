// ABOUTME: End-to-end tests of the rollback phases against a scripted command runner.
// ABOUTME: Verifies version checks, tag re-pointing, and that infrastructure is never applied.

mod support;

use lakeship::deploy::{DeployError, DeployErrorKind, PhaseEvent};
use lakeship::report::{Phase, PhaseStatus, WarningKind};
use lakeship::rollback::{self, Rollback, RollbackSummary};
use lakeship::types::{DeploymentTag, Environment};
use support::Harness;
use support::Project;

const TOKEN_VAR: &str = "LAKESHIP_TEST_TOKEN_ROLLBACK_FLOW";

const TAGS: &str = "v1.2.2\nv1.2.3\nlatest\n";

async fn run(h: &Harness, env: Environment, version: &str) -> Result<RollbackSummary, DeployError> {
    let start = Rollback::new(
        env,
        DeploymentTag::new(version).unwrap(),
        h.config.targets_for(env),
        true,
    )?;
    let tc = h.tc();
    rollback::run(start, &tc, &mut |_| {}).await
}

fn phase_status(summary: &RollbackSummary, phase: Phase) -> PhaseStatus {
    summary
        .phases
        .iter()
        .find(|r| r.phase == phase)
        .map(|r| r.status)
        .unwrap_or_else(|| panic!("no result for {}", phase))
}

#[tokio::test]
async fn staging_rollback_repoints_floating_tag_for_both_artifacts() {
    let h = Harness::new(Project::new().with_health_check());
    h.runner.on("az", &["show-tags"], 0, TAGS);

    let summary = run(&h, Environment::Staging, "v1.2.3").await.unwrap();

    for repo in ["etl-ingestion", "etl-dbt"] {
        let pinned = format!("acretlstaging001.azurecr.io/{}:v1.2.3", repo);
        let floating = format!("acretlstaging001.azurecr.io/{}:latest", repo);
        assert!(h.runner.ran("docker", &["pull", &pinned]));
        assert!(h.runner.ran("docker", &["tag", &pinned, &floating]));
        assert!(h.runner.ran("docker", &["push", &floating]));
    }
    assert!(!h.runner.ran("docker", &["build"]));
    assert!(!h.runner.ran("terraform", &["apply"]));
    assert!(h.runner.ran("terraform", &["plan"]));

    let reports = h.project.reports();
    assert_eq!(reports.len(), 1);
    let report = std::fs::read_to_string(&reports[0]).unwrap();
    assert!(report.starts_with("# Rollback Report: staging"));
    assert!(report.contains("v1.2.3"));
    assert_eq!(summary.report, reports[0]);
    assert_eq!(summary.version.as_str(), "v1.2.3");
    assert_eq!(phase_status(&summary, Phase::InfraCheck), PhaseStatus::Success);
}

#[tokio::test]
async fn unknown_version_fails_before_any_image_is_touched() {
    let h = Harness::new(Project::new());
    h.runner.on("az", &["show-tags"], 0, TAGS);

    let err = run(&h, Environment::Dev, "v9.9.9").await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::VersionNotFound);
    assert!(err.to_string().contains("etl-ingestion"));
    assert!(!h.runner.ran("docker", &[]));
    assert!(h.project.reports().is_empty());
}

#[tokio::test]
async fn failed_version_check_is_reported_as_a_failed_phase() {
    let h = Harness::new(Project::new());
    h.runner.on("az", &["show-tags"], 0, TAGS);
    let start = Rollback::new(
        Environment::Dev,
        DeploymentTag::new("v9.9.9").unwrap(),
        h.config.targets_for(Environment::Dev),
        true,
    )
    .unwrap();
    let tc = h.tc();
    let mut finished = Vec::new();

    let result = rollback::run(start, &tc, &mut |event| {
        if let PhaseEvent::Finished(result) = event {
            finished.push(result.clone());
        }
    })
    .await;

    assert!(result.is_err());
    let last = finished.last().unwrap();
    assert_eq!(last.phase, Phase::VersionCheck);
    assert_eq!(last.status, PhaseStatus::Failed);
}

#[tokio::test]
async fn notebooks_import_with_multi_line_persisted_outputs() {
    let project = Project::new().with_notebooks();
    project.write(
        "terraform/terraform-outputs-dev.txt",
        "databricks_workspace_url = \"https://adb-saved.azuredatabricks.net\"\n\
         cluster_init_script = \"#!/bin/sh\\nset -e\"\n",
    );
    let h = Harness::new(project).with_secret_var(Environment::Dev, TOKEN_VAR);
    h.runner.on("az", &["show-tags"], 0, TAGS);

    let summary = temp_env::async_with_vars([(TOKEN_VAR, Some("dapi-test"))], async {
        run(&h, Environment::Dev, "v1.2.3").await
    })
    .await
    .unwrap();

    assert_eq!(
        phase_status(&summary, Phase::NotebookRollback),
        PhaseStatus::Success
    );
    let import = h
        .runner
        .calls()
        .into_iter()
        .find(|c| c.matches("databricks", &["import-dir"]))
        .expect("notebooks imported");
    assert_eq!(
        import.env.get("DATABRICKS_HOST").map(String::as_str),
        Some("https://adb-saved.azuredatabricks.net")
    );
    assert_eq!(
        import.env.get("CLUSTER_INIT_SCRIPT").map(String::as_str),
        Some("#!/bin/sh\nset -e")
    );
}

#[tokio::test]
async fn tag_listing_failure_is_fatal() {
    let h = Harness::new(Project::new());
    h.runner
        .fail("az", &["show-tags"], "ResourceNotFound: registry not found");

    let err = run(&h, Environment::Dev, "v1.2.3").await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::ImagePublishFailed);
    assert!(!h.runner.ran("docker", &[]));
}

#[tokio::test]
async fn pull_failure_is_fatal() {
    let h = Harness::new(Project::new());
    h.runner
        .on("az", &["show-tags"], 0, TAGS)
        .fail("docker", &["pull"], "manifest unknown");

    let err = run(&h, Environment::Dev, "v1.2.3").await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::ImagePublishFailed);
    assert!(!h.runner.ran("docker", &["push"]));
    assert!(!h.runner.ran("terraform", &[]));
}

#[tokio::test]
async fn drift_is_reported_but_never_applied() {
    let h = Harness::new(Project::new().with_health_check());
    h.runner
        .on("az", &["show-tags"], 0, TAGS)
        .on("terraform", &["plan"], 2, "");

    let summary = run(&h, Environment::Dev, "v1.2.3").await.unwrap();

    assert!(!h.runner.ran("terraform", &["apply"]));
    let plan_args: Vec<String> = h
        .runner
        .calls()
        .into_iter()
        .filter(|c| c.matches("terraform", &["plan"]))
        .flat_map(|c| c.args)
        .collect();
    assert!(plan_args.iter().all(|a| !a.starts_with("-out")));

    let kinds: Vec<WarningKind> = summary
        .warnings()
        .filter(|(p, _)| *p == Phase::InfraCheck)
        .map(|(_, w)| w.kind)
        .collect();
    assert_eq!(kinds, vec![WarningKind::InfraDrift]);
    let report = std::fs::read_to_string(&summary.report).unwrap();
    assert!(report.contains("drift detected, not applied"));
}

#[tokio::test]
async fn plan_error_is_only_a_warning() {
    let h = Harness::new(Project::new().with_health_check());
    h.runner
        .on("az", &["show-tags"], 0, TAGS)
        .fail("terraform", &["plan"], "Error: backend unreachable");

    let summary = run(&h, Environment::Dev, "v1.2.3").await.unwrap();

    assert_eq!(phase_status(&summary, Phase::InfraCheck), PhaseStatus::Warning);
    assert_eq!(h.project.reports().len(), 1);
}

#[tokio::test]
async fn models_are_checked_out_and_rerun() {
    let h = Harness::new(Project::new().with_dbt().with_health_check());
    h.runner.on("az", &["show-tags"], 0, TAGS);

    let summary = run(&h, Environment::Dev, "v1.2.3").await.unwrap();

    let checkout = h
        .runner
        .position("git", &["checkout", "v1.2.3", "--", "dbt"])
        .unwrap();
    let dbt_run = h.runner.position("dbt", &["run", "--target", "dev"]).unwrap();
    assert!(checkout < dbt_run);
    assert_eq!(phase_status(&summary, Phase::ModelRollback), PhaseStatus::Success);
    assert_eq!(
        phase_status(&summary, Phase::NotebookRollback),
        PhaseStatus::Skipped
    );
}

#[tokio::test]
async fn failed_checkout_leaves_models_alone() {
    let h = Harness::new(Project::new().with_dbt());
    h.runner
        .on("az", &["show-tags"], 0, TAGS)
        .fail("git", &["checkout"], "error: pathspec 'v1.2.3' did not match");

    let summary = run(&h, Environment::Dev, "v1.2.3").await.unwrap();

    assert!(!h.runner.ran("dbt", &[]));
    assert_eq!(
        phase_status(&summary, Phase::ModelRollback),
        PhaseStatus::Warning
    );
}

#[tokio::test]
async fn dbt_run_failure_during_rollback_is_a_warning() {
    let h = Harness::new(Project::new().with_dbt());
    h.runner
        .on("az", &["show-tags"], 0, TAGS)
        .fail("dbt", &["run"], "Compilation Error");

    let summary = run(&h, Environment::Dev, "v1.2.3").await.unwrap();

    let kinds: Vec<WarningKind> = summary
        .warnings()
        .filter(|(p, _)| *p == Phase::ModelRollback)
        .map(|(_, w)| w.kind)
        .collect();
    assert_eq!(kinds, vec![WarningKind::StepFailed]);
    assert_eq!(h.project.reports().len(), 1);
}

#[tokio::test]
async fn unconfirmed_production_rollback_is_cancelled() {
    let h = Harness::new(Project::new());
    let env = Environment::Production;

    let err = Rollback::new(
        env,
        DeploymentTag::new("v1.2.3").unwrap(),
        h.config.targets_for(env),
        false,
    )
    .unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::RollbackCancelled);
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn non_production_needs_no_confirmation() {
    let env = Environment::Staging;
    let rollback = Rollback::new(
        env,
        DeploymentTag::new("v1.2.3").unwrap(),
        env.default_targets(),
        false,
    )
    .unwrap();

    assert_eq!(rollback.environment(), env);
    assert_eq!(rollback.last_result().unwrap().phase, Phase::Resolve);
}

#[tokio::test]
async fn interrupt_during_pull_stops_the_rollback() {
    let h = Harness::new(Project::new());
    h.runner
        .on("az", &["show-tags"], 0, TAGS)
        .interrupt_at("docker", &["pull"]);

    let err = run(&h, Environment::Dev, "v1.2.3").await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Interrupted);
    assert!(!h.runner.ran("terraform", &[]));
    assert!(h.project.reports().is_empty());
}
