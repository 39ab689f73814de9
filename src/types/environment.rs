// ABOUTME: Closed enumeration of deployment targets and their default identifiers.
// ABOUTME: Unknown names are rejected at the boundary with InvalidEnvironment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid environment '{0}' (expected one of: dev, staging, production)")]
pub struct InvalidEnvironment(pub String);

/// A deployment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Dev,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Suffix used for environment-scoped variables (`DATABRICKS_TOKEN_PROD`).
    pub fn var_suffix(&self) -> &'static str {
        match self {
            Environment::Dev => "DEV",
            Environment::Staging => "STAGING",
            Environment::Production => "PROD",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Built-in identifiers for this environment.
    pub fn default_targets(&self) -> EnvironmentTargets {
        match self {
            Environment::Dev => EnvironmentTargets {
                registry_name: "acretldev001".to_string(),
                resource_group: "rg-etl-dev".to_string(),
                secret_var_name: "DATABRICKS_TOKEN_DEV".to_string(),
            },
            Environment::Staging => EnvironmentTargets {
                registry_name: "acretlstaging001".to_string(),
                resource_group: "rg-etl-staging".to_string(),
                secret_var_name: "DATABRICKS_TOKEN_STAGING".to_string(),
            },
            Environment::Production => EnvironmentTargets {
                registry_name: "acretlprod001".to_string(),
                resource_group: "rg-etl-prod-001".to_string(),
                secret_var_name: "DATABRICKS_TOKEN_PROD".to_string(),
            },
        }
    }
}

impl FromStr for Environment {
    type Err = InvalidEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(InvalidEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment-scoped identifiers resolved before any phase runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentTargets {
    /// Container registry name (without login-server suffix).
    pub registry_name: String,
    /// Resource group holding the environment. Recorded in reports only;
    /// registry commands address the registry by name.
    pub resource_group: String,
    /// Name of the environment variable holding the platform access token.
    pub secret_var_name: String,
}
