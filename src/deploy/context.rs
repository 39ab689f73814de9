// ABOUTME: Immutable per-run deployment context: environment, tag, flags, targets.
// ABOUTME: Built once before any phase runs; also resolves the deployment tag.

use super::error::DeployError;
use crate::config::Config;
use crate::tools::Toolchain;
use crate::types::{DeploymentTag, Environment, EnvironmentTargets};
use chrono::Utc;
use serde::Serialize;
use std::fmt;

/// Operator switches for one deploy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeployFlags {
    pub skip_tests: bool,
    pub force: bool,
    pub dry_run: bool,
    pub build_images: bool,
}

impl Default for DeployFlags {
    fn default() -> Self {
        Self {
            skip_tests: false,
            force: false,
            dry_run: false,
            build_images: true,
        }
    }
}

impl fmt::Display for DeployFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = Vec::new();
        if self.skip_tests {
            set.push("--skip-tests");
        }
        if self.force {
            set.push("--force");
        }
        if self.dry_run {
            set.push("--dry-run");
        }
        if !self.build_images {
            set.push("--no-build");
        }
        if set.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", set.join(" "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentContext {
    environment: Environment,
    tag: DeploymentTag,
    flags: DeployFlags,
    targets: EnvironmentTargets,
}

impl DeploymentContext {
    pub fn new(
        environment: Environment,
        tag: DeploymentTag,
        flags: DeployFlags,
        config: &Config,
    ) -> Self {
        Self {
            environment,
            tag,
            flags,
            targets: config.targets_for(environment),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn tag(&self) -> &DeploymentTag {
        &self.tag
    }

    pub fn flags(&self) -> DeployFlags {
        self.flags
    }

    pub fn targets(&self) -> &EnvironmentTargets {
        &self.targets
    }
}

/// Production deploys are confirmed unless forced or dry.
pub fn requires_confirmation(environment: Environment, flags: DeployFlags) -> bool {
    environment.is_production() && !flags.force && !flags.dry_run
}

/// Pick the deployment tag: explicit, else the short commit id, else a
/// timestamped manual tag.
///
/// # Errors
///
/// Returns `DeployError::InvalidTag` if an explicit tag is malformed, or
/// `DeployError::Interrupted` if the commit lookup is interrupted.
pub async fn resolve_tag(
    explicit: Option<&str>,
    tc: &Toolchain<'_>,
) -> Result<DeploymentTag, DeployError> {
    if let Some(tag) = explicit {
        return Ok(DeploymentTag::new(tag)?);
    }

    match tc.git().short_head().await {
        Ok(Some(head)) => match DeploymentTag::new(&head) {
            Ok(tag) => return Ok(tag),
            Err(e) => tracing::debug!("commit id '{}' is not a usable tag: {}", head, e),
        },
        Ok(None) => tracing::debug!("not a git checkout, using a manual tag"),
        Err(e) if e.is_interrupted() => return Err(DeployError::interrupted("resolve")),
        Err(e) => tracing::debug!("git lookup failed: {}", e),
    }

    Ok(DeploymentTag::manual(Utc::now()))
}
