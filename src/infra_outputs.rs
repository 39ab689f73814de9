// ABOUTME: Typed key-value outputs captured from the provisioning tool.
// ABOUTME: Parses `terraform output -json` and persists a line-oriented `key = value` file.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Written in place of a sensitive value, as `terraform output` does.
pub const SENSITIVE_PLACEHOLDER: &str = "<sensitive>";

/// Opaque outputs of infrastructure convergence.
///
/// Values are strings; the orchestrator only ever looks keys up. Outputs
/// marked sensitive stay in memory: they are never written to disk and never
/// exported to child processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfrastructureOutputs {
    values: BTreeMap<String, String>,
    sensitive: BTreeSet<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OutputsError {
    #[error("malformed terraform output JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("terraform output JSON is not an object")]
    NotAnObject,

    #[error("line {line}: expected `key = value`")]
    MalformedLine { line: usize },

    #[error("line {line}: bad quoted value: {source}")]
    BadQuotedValue {
        line: usize,
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InfrastructureOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `terraform output -json`: `{ "name": { "value": ..., "sensitive": .. } }`.
    ///
    /// String values are kept verbatim; other values are stored as compact JSON.
    pub fn from_terraform_json(json: &str) -> Result<Self, OutputsError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: Value = serde_json::from_str(json)?;
        let object = parsed.as_object().ok_or(OutputsError::NotAnObject)?;

        let mut outputs = Self::default();
        for (key, entry) in object {
            let value = entry.get("value").unwrap_or(entry);
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if entry.get("sensitive").and_then(Value::as_bool) == Some(true) {
                outputs.sensitive.insert(key.clone());
            }
            outputs.values.insert(key.clone(), rendered);
        }
        Ok(outputs)
    }

    /// Parse the persisted `key = value` format.
    ///
    /// Values written by [`render`](Self::render) are JSON string literals.
    /// Bare values from hand-edited files are taken as-is. Blank lines, `#`
    /// comments, and sensitive placeholders are skipped.
    pub fn parse(text: &str) -> Result<Self, OutputsError> {
        let mut values = BTreeMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (key, value) = trimmed
                .split_once('=')
                .ok_or(OutputsError::MalformedLine { line })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(OutputsError::MalformedLine { line });
            }
            let value = value.trim();
            if value == SENSITIVE_PLACEHOLDER {
                continue;
            }
            let value = if value.starts_with('"') {
                serde_json::from_str::<String>(value)
                    .map_err(|source| OutputsError::BadQuotedValue { line, source })?
            } else {
                value.to_string()
            };
            values.insert(key.to_string(), value);
        }
        Ok(Self {
            values,
            sensitive: BTreeSet::new(),
        })
    }

    /// Load from `path`; `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, OutputsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// One `key = "value"` line per output, values JSON-escaped.
    pub fn render(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| {
                if self.sensitive.contains(k) {
                    format!("{} = {}\n", k, SENSITIVE_PLACEHOLDER)
                } else {
                    format!("{} = {}\n", k, Value::String(v.clone()))
                }
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), OutputsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive.contains(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fill in keys missing here from `other`.
    pub fn merge_missing(&mut self, other: &InfrastructureOutputs) {
        for (k, v) in &other.values {
            if self.values.contains_key(k) {
                continue;
            }
            self.values.insert(k.clone(), v.clone());
            if other.sensitive.contains(k) {
                self.sensitive.insert(k.clone());
            }
        }
    }

    /// Non-sensitive outputs as child-process environment variables
    /// (upper-cased keys).
    pub fn to_env(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .filter(|(k, _)| !self.sensitive.contains(*k))
            .map(|(k, v)| (k.to_ascii_uppercase(), v.clone()))
            .collect()
    }
}
