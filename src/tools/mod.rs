// ABOUTME: Typed wrappers over the external CLIs the phases drive.
// ABOUTME: Toolchain bundles the runner, configuration, project root, and interrupt token.

mod cloud;
mod container;
mod databricks;
mod dbt;
mod git;
mod health;
mod terraform;

pub use cloud::{Cloud, parse_tag_list};
pub use container::ContainerEngine;
pub use databricks::Databricks;
pub use dbt::Dbt;
pub use git::Git;
pub use health::{HealthCheck, HealthStatus};
pub use terraform::{PlanOutcome, Terraform, provisioning_env};

use crate::config::Config;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use crate::interrupt::Interrupt;
use crate::types::Environment;
use std::path::{Path, PathBuf};

/// Everything a phase needs to call out to external tools.
#[derive(Clone, Copy)]
pub struct Toolchain<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a Config,
    root: &'a Path,
    interrupt: &'a Interrupt,
}

impl<'a> Toolchain<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a Config,
        root: &'a Path,
        interrupt: &'a Interrupt,
    ) -> Self {
        Self {
            runner,
            config,
            root,
            interrupt,
        }
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Project root; relative config paths resolve against it.
    pub fn root(&self) -> &'a Path {
        self.root
    }

    pub fn path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn interrupt(&self) -> &'a Interrupt {
        self.interrupt
    }

    pub fn is_available(&self, program: &str) -> bool {
        self.runner.is_available(program)
    }

    /// Run a command from the project root with the default timeout unless the
    /// spec sets its own.
    pub async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        let mut spec = spec;
        if spec.current_dir.is_none() {
            spec.current_dir = Some(self.root.to_path_buf());
        }
        if spec.timeout.is_none() {
            spec.timeout = Some(self.config.timeouts.default);
        }
        self.runner.run(&spec, self.interrupt).await
    }

    pub fn cloud(&self) -> Cloud<'a> {
        Cloud::new(*self)
    }

    pub fn container(&self) -> ContainerEngine<'a> {
        ContainerEngine::new(*self)
    }

    pub fn git(&self) -> Git<'a> {
        Git::new(*self)
    }

    pub fn terraform(&self, env: Environment) -> Terraform<'a> {
        Terraform::new(*self, env)
    }

    pub fn dbt(&self) -> Dbt<'a> {
        Dbt::new(*self)
    }

    pub fn health(&self) -> HealthCheck<'a> {
        HealthCheck::new(*self)
    }
}

impl std::fmt::Debug for Toolchain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("root", &self.root)
            .finish()
    }
}
