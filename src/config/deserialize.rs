// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles the non-empty required-tools list and test command lines.

use nonempty::NonEmpty;
use serde::Deserialize;

pub fn deserialize_required_tools<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    if let Some(blank) = values.iter().find(|v| v.trim().is_empty()) {
        return Err(serde::de::Error::custom(format!(
            "required tool names cannot be blank: {:?}",
            blank
        )));
    }

    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one required tool must be listed"))
}

/// Accepts either `["python3", "-m", "pytest"]` or a whitespace-split string.
pub fn deserialize_command_lines<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries: Vec<CommandEntry> = Vec::deserialize(deserializer)?;
    entries
        .into_iter()
        .map(|entry| entry.into_argv())
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandEntry {
    Simple(String),
    Argv(Vec<String>),
}

impl CommandEntry {
    fn into_argv(self) -> Result<Vec<String>, String> {
        let argv = match self {
            CommandEntry::Simple(s) => s.split_whitespace().map(str::to_string).collect(),
            CommandEntry::Argv(v) => v,
        };
        if argv.is_empty() {
            return Err("test command cannot be empty".to_string());
        }
        Ok(argv)
    }
}
