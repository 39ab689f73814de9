// ABOUTME: Cloud-provider CLI calls: session check, registry login, tag listing.
// ABOUTME: Wraps `az account show`, `az acr login`, and `az acr repository show-tags`.

use super::Toolchain;
use crate::exec::{CommandOutput, CommandSpec, ExecError};

pub struct Cloud<'a> {
    tc: Toolchain<'a>,
}

impl<'a> Cloud<'a> {
    pub fn new(tc: Toolchain<'a>) -> Self {
        Self { tc }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.tc.config().tools.cloud)
    }

    /// Succeeds only with an authenticated session.
    pub async fn account_show(&self) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command().args(["account", "show", "--output", "none"]))
            .await
    }

    pub async fn registry_login(&self, registry_name: &str) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command().args(["acr", "login", "--name", registry_name]))
            .await
    }

    pub async fn list_tags(
        &self,
        registry_name: &str,
        repository: &str,
    ) -> Result<CommandOutput, ExecError> {
        self.tc
            .run(self.command().args([
                "acr",
                "repository",
                "show-tags",
                "--name",
                registry_name,
                "--repository",
                repository,
                "--output",
                "tsv",
            ]))
            .await
    }
}

/// Tags from `show-tags --output tsv` (one per line).
pub fn parse_tag_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tsv_tag_list() {
        let tags = parse_tag_list("latest\nv1.2.3\n\n  abc1234  \n");
        assert_eq!(tags, vec!["latest", "v1.2.3", "abc1234"]);
    }

    #[test]
    fn empty_output_has_no_tags() {
        assert!(parse_tag_list("").is_empty());
    }
}
