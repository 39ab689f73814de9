// ABOUTME: Persisted Markdown record of a finished deployment or rollback.
// ABOUTME: Each run writes a new uniquely named file; records are never rewritten.

use super::phase::{PhaseResult, PhaseStatus};
use crate::deploy::DeployFlags;
use crate::types::{Environment, EnvironmentTargets};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Deployment,
    Rollback,
}

impl RecordKind {
    fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Deployment => "deployment",
            RecordKind::Rollback => "rollback",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            RecordKind::Deployment => "Deployment Report",
            RecordKind::Rollback => "Rollback Report",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub kind: RecordKind,
    pub environment: Environment,
    /// Deployment tag, or the version rolled back to.
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<DeployFlags>,
    pub targets: EnvironmentTargets,
    /// How infrastructure convergence ended, e.g. "no changes".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub operator_host: String,
    pub phases: Vec<PhaseResult>,
    pub rollback_command: String,
}

impl DeploymentRecord {
    /// Command that restores `version` in `env` later on.
    pub fn rollback_command_for(env: Environment, version: &str) -> String {
        format!("lakeship rollback {} {}", env, version)
    }

    pub fn operator_host() -> String {
        gethostname::gethostname().to_string_lossy().into_owned()
    }

    /// Base file name, without collision suffix.
    pub fn file_stem(&self) -> String {
        format!(
            "{}-report-{}-{}",
            self.kind.as_str(),
            self.environment,
            self.finished_at.format("%Y%m%d-%H%M%S")
        )
    }

    pub fn has_warnings(&self) -> bool {
        self.phases.iter().any(|p| p.status == PhaseStatus::Warning)
    }

    pub fn render_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# {}: {}", self.kind.title(), self.environment);
        let _ = writeln!(md);
        let _ = writeln!(md, "| Field | Value |");
        let _ = writeln!(md, "|---|---|");
        let _ = writeln!(md, "| Environment | {} |", self.environment);
        let version_label = match self.kind {
            RecordKind::Deployment => "Deployment tag",
            RecordKind::Rollback => "Rolled back to",
        };
        let _ = writeln!(md, "| {} | `{}` |", version_label, self.version);
        let _ = writeln!(md, "| Registry | {} |", self.targets.registry_name);
        let _ = writeln!(md, "| Resource group | {} |", self.targets.resource_group);
        if let Some(ref infra) = self.infrastructure {
            let _ = writeln!(md, "| Infrastructure | {} |", infra);
        }
        if let Some(ref flags) = self.flags {
            let _ = writeln!(md, "| Flags | {} |", flags);
        }
        let _ = writeln!(md, "| Started | {} |", self.started_at.to_rfc3339());
        let _ = writeln!(md, "| Finished | {} |", self.finished_at.to_rfc3339());
        let _ = writeln!(md, "| Operator host | {} |", self.operator_host);
        let _ = writeln!(md);
        let _ = writeln!(md, "## Phases");
        let _ = writeln!(md);
        for result in &self.phases {
            let (mark, suffix) = match result.status {
                PhaseStatus::Success => ("x", ""),
                PhaseStatus::Warning => ("x", " (warning)"),
                PhaseStatus::Failed => (" ", " (failed)"),
                PhaseStatus::Skipped => (" ", " (skipped)"),
            };
            let _ = writeln!(
                md,
                "- [{}] {}{}: {}",
                mark,
                result.phase.title(),
                suffix,
                result.detail
            );
            for warning in &result.warnings {
                let kind = serde_json::to_value(warning.kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let _ = writeln!(md, "  - warning `{}`: {}", kind, warning.message);
            }
        }
        let _ = writeln!(md);
        let _ = writeln!(md, "## Rollback");
        let _ = writeln!(md);
        let _ = writeln!(md, "```sh");
        let _ = writeln!(md, "{}", self.rollback_command);
        let _ = writeln!(md, "```");
        md
    }

    /// Write the record as a new file in `dir`, returning its path.
    ///
    /// Existing files are never overwritten; a numeric suffix is added when
    /// two runs finish within the same second.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let content = self.render_markdown();
        let stem = self.file_stem();

        for attempt in 0..100u32 {
            let name = if attempt == 0 {
                format!("{}.md", stem)
            } else {
                format!("{}-{}.md", stem, attempt)
            };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("too many reports named {} in {}", stem, dir.display()),
        ))
    }
}
