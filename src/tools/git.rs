// ABOUTME: Version-control calls: short commit id for tagging, path checkout for rollback.
// ABOUTME: Failures are returned as outputs; callers decide whether they matter.

use super::Toolchain;
use crate::exec::{CommandOutput, CommandSpec, ExecError};
use std::path::Path;

pub struct Git<'a> {
    tc: Toolchain<'a>,
}

impl<'a> Git<'a> {
    pub fn new(tc: Toolchain<'a>) -> Self {
        Self { tc }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.tc.config().tools.git)
    }

    /// Short id of HEAD, or `None` outside a repository.
    pub async fn short_head(&self) -> Result<Option<String>, ExecError> {
        if !self.tc.is_available(&self.tc.config().tools.git) {
            return Ok(None);
        }
        let output = self
            .tc
            .run(self.command().args(["rev-parse", "--short", "HEAD"]))
            .await?;
        if !output.success() {
            return Ok(None);
        }
        let head = output.stdout.trim();
        Ok((!head.is_empty()).then(|| head.to_string()))
    }

    /// Restore `path` in the working tree to its content at `revision`.
    pub async fn checkout_path(
        &self,
        revision: &str,
        path: &Path,
    ) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(
                self.command()
                    .args(["checkout", revision, "--"])
                    .arg(path.display().to_string()),
            )
            .await
    }
}
