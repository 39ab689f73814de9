// ABOUTME: Validated domain types shared by the deploy and rollback flows.
// ABOUTME: Environments, deployment tags, and container image references.

mod deployment_tag;
mod environment;
mod image_ref;

pub use deployment_tag::{DeploymentTag, DeploymentTagError};
pub use environment::{Environment, EnvironmentTargets, InvalidEnvironment};
pub use image_ref::{ImageRef, ParseImageRefError};
