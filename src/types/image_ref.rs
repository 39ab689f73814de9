// ABOUTME: Container image reference parsing and formatting.
// ABOUTME: Handles registry/repository:tag forms used when publishing artifacts.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    repository: String,
    tag: String,
}

impl ImageRef {
    /// Reference for `repository:tag` in the given registry login server.
    pub fn new(registry: &str, repository: &str, tag: &str) -> Self {
        Self {
            registry: Some(registry.to_string()),
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input.chars().find(|c| {
            !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_')
        }) {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        // A colon after the last slash separates the tag; earlier colons are ports.
        let (without_tag, tag) = match input.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, after.to_string()),
            _ => (input, "latest".to_string()),
        };

        if tag.is_empty() {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let (registry, repository) = match without_tag.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest.to_string())
            }
            _ => (None, without_tag.to_string()),
        };

        if repository.is_empty() || repository.ends_with('/') {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            registry,
            repository,
            tag,
        })
    }

    /// Same repository, different tag.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: tag.to_string(),
        }
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
