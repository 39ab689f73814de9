// ABOUTME: Provisioning-tool calls and the tri-state plan outcome.
// ABOUTME: Injects ARM_* credentials per environment and runs inside the terraform directory.

use super::Toolchain;
use crate::exec::{CommandOutput, CommandSpec, ExecError};
use crate::types::Environment;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Credential variables forwarded to the provisioning tool without their
/// environment suffix.
const CREDENTIAL_VARS: [&str; 4] = [
    "ARM_CLIENT_ID",
    "ARM_CLIENT_SECRET",
    "ARM_SUBSCRIPTION_ID",
    "ARM_TENANT_ID",
];

/// Result of a detailed-exit-code plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    NoChanges,
    ChangesPending,
    Error(String),
}

impl PlanOutcome {
    /// 0 means nothing to do, 2 means changes pending, anything else is an error.
    pub fn from_output(output: &CommandOutput) -> Self {
        match output.exit_code {
            Some(0) => PlanOutcome::NoChanges,
            Some(2) => PlanOutcome::ChangesPending,
            _ => PlanOutcome::Error(output.failure_summary()),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            PlanOutcome::NoChanges => "no changes",
            PlanOutcome::ChangesPending => "changes pending",
            PlanOutcome::Error(_) => "plan error",
        }
    }
}

/// `ARM_CLIENT_ID_DEV` and friends, re-keyed without the suffix.
///
/// Variables that are unset or empty are left out.
pub fn provisioning_env(env: Environment) -> BTreeMap<String, String> {
    CREDENTIAL_VARS
        .iter()
        .filter_map(|name| {
            let suffixed = format!("{}_{}", name, env.var_suffix());
            std::env::var(&suffixed)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v))
        })
        .collect()
}

pub struct Terraform<'a> {
    tc: Toolchain<'a>,
    env: Environment,
    credentials: BTreeMap<String, String>,
}

impl<'a> Terraform<'a> {
    pub fn new(tc: Toolchain<'a>, env: Environment) -> Self {
        Self {
            tc,
            env,
            credentials: provisioning_env(env),
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.tc.path(&self.tc.config().terraform.dir)
    }

    fn var_file(&self) -> String {
        self.tc.config().terraform.var_file(self.env).display().to_string()
    }

    /// Plan file name; relative to the terraform directory.
    pub fn plan_file(&self) -> String {
        self.tc.config().terraform.plan_file(self.env)
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.tc.config().tools.terraform)
            .current_dir(self.dir())
            .timeout(self.tc.config().timeouts.terraform)
            .envs(self.credentials.iter())
    }

    pub async fn init(&self, backend: bool) -> Result<CommandOutput, ExecError> {
        let mut spec = self.command().arg("init").arg("-input=false");
        if !backend {
            spec = spec.arg("-backend=false");
        }
        self.tc.run(spec).await
    }

    pub async fn validate(&self) -> Result<CommandOutput, ExecError> {
        self.tc.run(self.command().arg("validate")).await
    }

    pub async fn fmt_check(&self) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command().args(["fmt", "-check", "-recursive"]))
            .await
    }

    /// Plan against the environment's var file. With `save`, the plan is
    /// written to the plan file for a later apply.
    pub async fn plan(&self, save: bool) -> Result<PlanOutcome, ExecError> {
        let mut spec = self.command().args([
            "plan".to_string(),
            "-detailed-exitcode".to_string(),
            "-input=false".to_string(),
            format!("-var-file={}", self.var_file()),
        ]);
        if save {
            spec = spec.arg(format!("-out={}", self.plan_file()));
        }
        let output = self.tc.run(spec).await?;
        Ok(PlanOutcome::from_output(&output))
    }

    pub async fn apply(&self) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(
                self.command()
                    .args(["apply", "-input=false", "-auto-approve"])
                    .arg(self.plan_file()),
            )
            .await
    }

    pub async fn output_json(&self) -> Result<CommandOutput, ExecError> {
        self.tc.run(self.command().args(["output", "-json"])).await
    }
}
