// ABOUTME: Configuration types and parsing for lakeship.yml.
// ABOUTME: Every key has a default, so a project without a config file still deploys.

mod artifact;
mod deserialize;
mod env_value;
mod timeouts;

pub use artifact::{ArtifactConfig, ArtifactKind, ArtifactsConfig};
pub use env_value::EnvValue;
pub use timeouts::TimeoutsConfig;

use crate::error::{Error, Result};
use crate::types::{Environment, EnvironmentTargets};
use deserialize::{deserialize_command_lines, deserialize_required_tools};
use nonempty::{NonEmpty, nonempty};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "lakeship.yml";
pub const CONFIG_FILENAME_ALT: &str = "lakeship.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".lakeship/config.yml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub project: ProjectConfig,
    pub registry: RegistryConfig,
    pub artifacts: ArtifactsConfig,
    pub environments: HashMap<Environment, EnvironmentOverride>,
    pub tools: ToolsConfig,
    pub terraform: TerraformConfig,
    pub dbt: DbtConfig,
    pub databricks: DatabricksConfig,
    pub tests: TestsConfig,
    pub verification: VerificationConfig,
    pub timeouts: TimeoutsConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// File whose presence identifies the project root.
    pub marker: PathBuf,
    /// Where deployment and rollback records are written.
    pub reports_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            marker: PathBuf::from("terraform/main.tf"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Appended to the registry name to form the login server.
    pub suffix: String,
    /// Mutable alias re-pointed on non-production publishes and on rollback.
    pub floating_tag: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            suffix: "azurecr.io".to_string(),
            floating_tag: "latest".to_string(),
        }
    }
}

/// Per-environment overrides of the built-in identifiers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentOverride {
    pub registry_name: Option<String>,
    pub resource_group: Option<String>,
    pub secret_var_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    /// Executables that must resolve on PATH before anything runs.
    #[serde(deserialize_with = "deserialize_required_tools")]
    pub required: NonEmpty<String>,
    pub cloud: String,
    pub container: String,
    pub terraform: String,
    pub dbt: String,
    pub databricks: String,
    pub git: String,
    pub python: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            required: nonempty![
                "az".to_string(),
                "docker".to_string(),
                "terraform".to_string(),
                "git".to_string()
            ],
            cloud: "az".to_string(),
            container: "docker".to_string(),
            terraform: "terraform".to_string(),
            dbt: "dbt".to_string(),
            databricks: "databricks".to_string(),
            git: "git".to_string(),
            python: "python3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerraformConfig {
    pub dir: PathBuf,
    /// Directory of `<env>.tfvars` files, relative to `dir`.
    pub environments_dir: PathBuf,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("terraform"),
            environments_dir: PathBuf::from("environments"),
        }
    }
}

impl TerraformConfig {
    /// Var file path relative to the terraform directory.
    pub fn var_file(&self, env: Environment) -> PathBuf {
        self.environments_dir.join(format!("{}.tfvars", env))
    }

    /// Saved plan file name, relative to the terraform directory.
    pub fn plan_file(&self, env: Environment) -> String {
        format!("tfplan-{}", env)
    }

    /// Persisted outputs file, relative to the project root.
    pub fn outputs_file(&self, env: Environment) -> PathBuf {
        self.dir.join(format!("terraform-outputs-{}.txt", env))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbtConfig {
    pub dir: PathBuf,
}

impl Default for DbtConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dbt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabricksConfig {
    pub notebooks_dir: PathBuf,
    pub workspace_path: String,
    /// Terraform output holding the workspace URL.
    pub host_output: String,
}

impl Default for DatabricksConfig {
    fn default() -> Self {
        Self {
            notebooks_dir: PathBuf::from("databricks/notebooks"),
            workspace_path: "/Shared/etl".to_string(),
            host_output: "databricks_workspace_url".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestsConfig {
    #[serde(deserialize_with = "deserialize_command_lines")]
    pub commands: Vec<Vec<String>>,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            commands: vec![
                ["python3", "-m", "pytest", "tests/unit", "-q"]
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationConfig {
    /// Health-check script, invoked with `--environment <env>`.
    pub health_check: PathBuf,
    /// Smoke-test directory; run with pytest when present.
    pub smoke_tests: PathBuf,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            health_check: PathBuf::from("scripts/monitoring/health_check.py"),
            smoke_tests: PathBuf::from("tests/smoke"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationsConfig {
    pub webhook: Option<EnvValue>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook: Some(EnvValue::from_env("DEPLOY_WEBHOOK_URL")),
        }
    }
}

impl NotificationsConfig {
    /// Webhook URL, if one is configured and set.
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook.as_ref().and_then(EnvValue::resolve_optional)
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document means "all defaults".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`, or defaults if there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        tracing::debug!("no configuration file in {}, using defaults", dir.display());
        Ok(Self::default())
    }

    /// Resolve the environment-scoped identifiers, applying overrides.
    pub fn targets_for(&self, env: Environment) -> EnvironmentTargets {
        let mut targets = env.default_targets();
        if let Some(over) = self.environments.get(&env) {
            if let Some(ref v) = over.registry_name {
                targets.registry_name = v.clone();
            }
            if let Some(ref v) = over.resource_group {
                targets.resource_group = v.clone();
            }
            if let Some(ref v) = over.secret_var_name {
                targets.secret_var_name = v.clone();
            }
        }
        targets
    }

    /// Registry login server for the given targets (`acretldev001.azurecr.io`).
    pub fn login_server(&self, targets: &EnvironmentTargets) -> String {
        format!("{}.{}", targets.registry_name, self.registry.suffix)
    }
}
