// ABOUTME: Notebook import into the analytics workspace.
// ABOUTME: Host and token are passed to the CLI through its environment only.

use super::Toolchain;
use crate::exec::{CommandOutput, CommandSpec, ExecError};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct Databricks<'a> {
    tc: Toolchain<'a>,
    host: String,
    token: String,
    env: BTreeMap<String, String>,
}

impl<'a> Databricks<'a> {
    pub fn new(tc: Toolchain<'a>, host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            tc,
            host: host.into(),
            token: token.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn notebooks_dir(&self) -> PathBuf {
        self.tc.path(&self.tc.config().databricks.notebooks_dir)
    }

    /// Import the notebooks directory over the workspace path.
    pub async fn import_notebooks(&self) -> Result<CommandOutput, ExecError> {
        let cfg = &self.tc.config().databricks;
        let spec = CommandSpec::new(&self.tc.config().tools.databricks)
            .args(["workspace", "import-dir"])
            .arg(self.notebooks_dir().display().to_string())
            .arg(cfg.workspace_path.as_str())
            .arg("--overwrite")
            .envs(self.env.iter())
            .env("DATABRICKS_HOST", self.host.as_str())
            .env("DATABRICKS_TOKEN", self.token.as_str());
        self.tc.run(spec).await
    }
}
