// ABOUTME: Per-collaborator timeouts for external commands.
// ABOUTME: Durations are humantime strings such as "30m" or "45s".

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    /// Quick CLI calls: account checks, tag listing, git, tool validation.
    #[serde(with = "humantime_serde")]
    pub default: Duration,

    /// Image build and push.
    #[serde(with = "humantime_serde")]
    pub build: Duration,

    /// Terraform init, plan, and apply.
    #[serde(with = "humantime_serde")]
    pub terraform: Duration,

    /// dbt deps, run, and test.
    #[serde(with = "humantime_serde")]
    pub dbt: Duration,

    /// Pre-deploy test suite and smoke tests.
    #[serde(with = "humantime_serde")]
    pub tests: Duration,

    #[serde(with = "humantime_serde")]
    pub health_check: Duration,

    #[serde(with = "humantime_serde")]
    pub notification: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(5 * 60),
            build: Duration::from_secs(30 * 60),
            terraform: Duration::from_secs(30 * 60),
            dbt: Duration::from_secs(60 * 60),
            tests: Duration::from_secs(30 * 60),
            health_check: Duration::from_secs(5 * 60),
            notification: Duration::from_secs(10),
        }
    }
}
