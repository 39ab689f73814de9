// ABOUTME: Application-wide error types for lakeship.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::deploy::{DeployError, DeployErrorKind};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Deploy(e) if e.kind() == DeployErrorKind::Interrupted => 130,
            _ => 1,
        }
    }

    /// Whether this is an operator-declined confirmation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Error::Deploy(e) if matches!(
                e.kind(),
                DeployErrorKind::DeploymentCancelled | DeployErrorKind::RollbackCancelled
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
