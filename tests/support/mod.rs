// ABOUTME: Test support utilities.
// ABOUTME: Scripted command runner, on-disk project fixture, and tracing setup.

use async_trait::async_trait;
use lakeship::config::{Config, EnvironmentOverride};
use lakeship::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use lakeship::interrupt::Interrupt;
use lakeship::tools::Toolchain;
use lakeship::types::Environment;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("lakeship=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

struct Rule {
    program: String,
    tokens: Vec<String>,
    output: CommandOutput,
}

/// A `CommandRunner` that never spawns anything.
///
/// Every command succeeds with empty output unless a rule says otherwise.
/// Rules added later take precedence. Every call is recorded.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
    missing: Mutex<HashSet<String>>,
    interrupt_on: Mutex<Option<(String, Vec<String>)>>,
}

#[allow(dead_code)]
impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands matching `program` and `tokens` with `exit` and `stdout`.
    pub fn on(&self, program: &str, tokens: &[&str], exit: i32, stdout: &str) -> &Self {
        self.rules.lock().push(Rule {
            program: program.to_string(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            output: CommandOutput {
                exit_code: Some(exit),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        });
        self
    }

    /// Make matching commands exit 1 with `stderr`.
    pub fn fail(&self, program: &str, tokens: &[&str], stderr: &str) -> &Self {
        self.rules.lock().push(Rule {
            program: program.to_string(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            output: CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        });
        self
    }

    /// Pretend `program` is not on PATH.
    pub fn without_tool(&self, program: &str) -> &Self {
        self.missing.lock().insert(program.to_string());
        self
    }

    /// Trigger `interrupt` when a matching command starts, and report it as
    /// interrupted.
    pub fn interrupt_at(&self, program: &str, tokens: &[&str]) -> &Self {
        *self.interrupt_on.lock() = Some((
            program.to_string(),
            tokens.iter().map(|t| t.to_string()).collect(),
        ));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Recorded commands rendered as `program arg ...`.
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(ToString::to_string).collect()
    }

    pub fn count(&self, program: &str, tokens: &[&str]) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.matches(program, tokens))
            .count()
    }

    pub fn ran(&self, program: &str, tokens: &[&str]) -> bool {
        self.count(program, tokens) > 0
    }

    /// Index of the first matching call, for ordering assertions.
    pub fn position(&self, program: &str, tokens: &[&str]) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|c| c.matches(program, tokens))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        interrupt: &Interrupt,
    ) -> Result<CommandOutput, ExecError> {
        self.calls.lock().push(spec.clone());

        let interrupt_here = self.interrupt_on.lock().as_ref().is_some_and(|(p, t)| {
            let tokens: Vec<&str> = t.iter().map(String::as_str).collect();
            spec.matches(p, &tokens)
        });
        if interrupt_here {
            interrupt.trigger();
            return Err(ExecError::Interrupted {
                program: spec.program.clone(),
            });
        }

        let rules = self.rules.lock();
        let output = rules
            .iter()
            .rev()
            .find(|rule| {
                let tokens: Vec<&str> = rule.tokens.iter().map(String::as_str).collect();
                spec.matches(&rule.program, &tokens)
            })
            .map(|rule| rule.output.clone())
            .unwrap_or(CommandOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            });
        Ok(output)
    }

    fn is_available(&self, program: &str) -> bool {
        !self.missing.lock().contains(program)
    }
}

/// A temporary project laid out the way the orchestrator expects.
pub struct Project {
    dir: TempDir,
}

#[allow(dead_code)]
impl Project {
    /// Marker file plus a var file for every environment.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let project = Self { dir };
        project.write("terraform/main.tf", "terraform {}\n");
        for env in Environment::ALL {
            project.write(
                &format!("terraform/environments/{}.tfvars", env),
                &format!("environment = \"{}\"\n", env),
            );
        }
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn with_dbt(self) -> Self {
        self.write("dbt/dbt_project.yml", "name: etl\n");
        self
    }

    pub fn with_notebooks(self) -> Self {
        self.write("databricks/notebooks/bronze_ingest.py", "# notebook\n");
        self
    }

    pub fn with_health_check(self) -> Self {
        self.write("scripts/monitoring/health_check.py", "print('ok')\n");
        self
    }

    pub fn with_smoke_tests(self) -> Self {
        self.write("tests/smoke/test_smoke.py", "def test_ok():\n    pass\n");
        self
    }

    /// Written deployment and rollback records, sorted by name.
    pub fn reports(&self) -> Vec<PathBuf> {
        let dir = self.dir.path().join("reports");
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut reports: Vec<PathBuf> = entries.map(|e| e.unwrap().path()).collect();
        reports.sort();
        reports
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.dir.path().join(relative)).unwrap()
    }
}

/// Everything a flow test needs to build a `Toolchain`.
pub struct Harness {
    pub runner: ScriptedRunner,
    pub config: Config,
    pub interrupt: Interrupt,
    pub project: Project,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(project: Project) -> Self {
        init_tracing();
        let mut config = Config::default();
        // Never pick up a webhook from the developer's shell.
        config.notifications.webhook = None;
        Self {
            runner: ScriptedRunner::new(),
            config,
            interrupt: Interrupt::new(),
            project,
        }
    }

    /// Read the platform token for `env` from `var` instead of the default.
    pub fn with_secret_var(mut self, env: Environment, var: &str) -> Self {
        self.config.environments.insert(
            env,
            EnvironmentOverride {
                secret_var_name: Some(var.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn tc(&self) -> Toolchain<'_> {
        Toolchain::new(
            &self.runner,
            &self.config,
            self.project.path(),
            &self.interrupt,
        )
    }
}

/// `terraform output -json` for a workspace with a Databricks URL.
#[allow(dead_code)]
pub const TERRAFORM_OUTPUTS: &str = r#"{
  "databricks_workspace_url": {"sensitive": false, "type": "string", "value": "https://adb-1234.azuredatabricks.net"},
  "storage_account_name": {"sensitive": false, "type": "string", "value": "stetldev001"}
}"#;
