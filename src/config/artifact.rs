// ABOUTME: Container artifact definitions published on every deployment.
// ABOUTME: The ingestion and transformation images with their build inputs.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Which of the two published artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Ingestion,
    Transformation,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Ingestion => write!(f, "ingestion"),
            ArtifactKind::Transformation => write!(f, "transformation"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
    /// Repository name inside the registry.
    pub repository: String,
    /// Dockerfile path, relative to the project root.
    pub dockerfile: PathBuf,
    /// Build context, relative to the project root.
    #[serde(default = "default_context")]
    pub context: PathBuf,
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactsConfig {
    pub ingestion: ArtifactConfig,
    pub transformation: ArtifactConfig,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            ingestion: ArtifactConfig {
                repository: "etl-ingestion".to_string(),
                dockerfile: PathBuf::from("docker/ingestion/Dockerfile"),
                context: default_context(),
            },
            transformation: ArtifactConfig {
                repository: "etl-dbt".to_string(),
                dockerfile: PathBuf::from("docker/dbt/Dockerfile"),
                context: default_context(),
            },
        }
    }
}

impl ArtifactsConfig {
    /// Both artifacts in publish order.
    pub fn iter(&self) -> [(ArtifactKind, &ArtifactConfig); 2] {
        [
            (ArtifactKind::Ingestion, &self.ingestion),
            (ArtifactKind::Transformation, &self.transformation),
        ]
    }
}
