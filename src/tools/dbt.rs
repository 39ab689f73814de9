// ABOUTME: Transformation-tool calls: dependency resolution, model runs, model tests.
// ABOUTME: Every call points --project-dir and --profiles-dir at the configured dbt directory.

use super::Toolchain;
use crate::exec::{CommandOutput, CommandSpec, ExecError};
use crate::types::Environment;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct Dbt<'a> {
    tc: Toolchain<'a>,
    env: BTreeMap<String, String>,
}

impl<'a> Dbt<'a> {
    pub fn new(tc: Toolchain<'a>) -> Self {
        Self {
            tc,
            env: BTreeMap::new(),
        }
    }

    /// Extra variables for every dbt child process.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn program(&self) -> &'a str {
        &self.tc.config().tools.dbt
    }

    pub fn dir(&self) -> PathBuf {
        self.tc.path(&self.tc.config().dbt.dir)
    }

    pub fn is_available(&self) -> bool {
        self.tc.is_available(self.program())
    }

    fn command(&self, subcommand: &str) -> CommandSpec {
        let dir = self.dir().display().to_string();
        CommandSpec::new(self.program())
            .arg(subcommand)
            .args(["--project-dir", dir.as_str(), "--profiles-dir", dir.as_str()])
            .current_dir(self.dir())
            .timeout(self.tc.config().timeouts.dbt)
            .envs(self.env.iter())
    }

    pub async fn deps(&self) -> Result<CommandOutput, ExecError> {
        self.tc.run(self.command("deps")).await
    }

    pub async fn run(&self, target: Environment) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command("run").args(["--target", target.as_str()]))
            .await
    }

    pub async fn test(&self, target: Environment) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command("test").args(["--target", target.as_str()]))
            .await
    }
}
