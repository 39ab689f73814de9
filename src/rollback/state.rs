// ABOUTME: Rollback state marker types for the type state pattern.
// ABOUTME: Mirrors the deploy markers; only the terminal state carries data.

use std::path::PathBuf;

/// Operator confirmed (or confirmation not required).
/// Available actions: `verify_version()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Confirmed;

/// Requested version exists in the registry.
/// Available actions: `rollback_containers()`
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionVerified;

/// Floating tags point at the requested version again.
/// Available actions: `check_infra()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainersRolledBack;

/// Infrastructure drift checked, never applied.
/// Available actions: `rollback_notebooks()`
#[derive(Debug, Clone, Copy, Default)]
pub struct InfraChecked;

/// Notebooks restored (best effort).
/// Available actions: `rollback_models()`
#[derive(Debug, Clone, Copy, Default)]
pub struct NotebooksRolledBack;

/// Models restored (best effort).
/// Available actions: `verify()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelsRolledBack;

/// Health check done.
/// Available actions: `report()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Verified;

/// Rollback record written.
/// Available actions: `finish()`
#[derive(Debug, Clone, Default)]
pub struct Reported {
    pub(crate) report: PathBuf,
}
