// ABOUTME: Validated container image tag identifying one deployment.
// ABOUTME: Built from a commit hash, an explicit --tag, or a manual timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentTagError {
    #[error("deployment tag cannot be empty")]
    Empty,

    #[error("deployment tag exceeds maximum length of 128 characters")]
    TooLong,

    #[error("deployment tag cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in deployment tag: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeploymentTag(String);

impl DeploymentTag {
    pub fn new(value: &str) -> Result<Self, DeploymentTagError> {
        let value = value.trim();
        let first = value.chars().next().ok_or(DeploymentTagError::Empty)?;

        if value.len() > 128 {
            return Err(DeploymentTagError::TooLong);
        }

        if first == '.' || first == '-' {
            return Err(DeploymentTagError::InvalidStart(first));
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '.' | '-'))
        {
            return Err(DeploymentTagError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    /// Tag used when no commit hash is available.
    pub fn manual(at: DateTime<Utc>) -> Self {
        Self(format!("manual-{}", at.format("%Y%m%d-%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
