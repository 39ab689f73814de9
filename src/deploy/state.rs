// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Each state carries only what the following phases need.

use crate::infra_outputs::InfrastructureOutputs;
use std::path::PathBuf;

/// Context resolved, nothing executed yet.
/// Available actions: `preflight()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolved;

/// Pre-flight checks passed.
/// Available actions: `run_tests()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Preflighted;

/// Pre-deploy tests passed, forced, or skipped.
/// Available actions: `publish_images()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Tested;

/// Images built and pushed (or skipped).
/// Available actions: `converge_infra()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagesPublished;

/// Infrastructure matches the declared state.
/// Available actions: `deploy_application()`
#[derive(Debug, Clone, Default)]
pub struct InfraConverged {
    pub(crate) outputs: InfrastructureOutputs,
}

/// Notebooks and models deployed.
/// Available actions: `verify()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationDeployed;

/// Health check and smoke tests done.
/// Available actions: `report()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Verified;

/// Record written (unless dry run) and notification attempted.
/// Available actions: `finish()`
#[derive(Debug, Clone, Default)]
pub struct Reported {
    pub(crate) report: Option<PathBuf>,
}
