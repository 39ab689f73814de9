// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports state markers, the Deployment struct, and the phase driver.

mod confirm;
mod context;
mod deployment;
mod error;
mod state;
mod transitions;

pub use confirm::{CONFIRMATION_TOKEN, read_confirmation};
pub use context::{DeployFlags, DeploymentContext, requires_confirmation, resolve_tag};
pub use deployment::Deployment;
pub use error::{DeployError, DeployErrorKind, ExecErrorExt, StepResultExt};
pub use state::{
    ApplicationDeployed, ImagesPublished, InfraConverged, Preflighted, Reported, Resolved, Tested,
    Verified,
};
pub use transitions::{DeploymentSummary, planned_images};

pub(crate) use transitions::{check_health, import_notebooks, persisted_outputs, publish_record};

use crate::report::{Phase, PhaseResult};
use crate::tools::Toolchain;

/// Progress notifications emitted while phases run.
#[derive(Debug, Clone, Copy)]
pub enum PhaseEvent<'a> {
    Started(Phase),
    Finished(&'a PhaseResult),
}

/// Run every deploy phase in order, reporting progress through `on_event`.
///
/// # Errors
///
/// Returns the first fatal error; phases after it never run.
pub async fn run(
    context: DeploymentContext,
    tc: &Toolchain<'_>,
    on_event: &mut dyn FnMut(PhaseEvent<'_>),
) -> Result<DeploymentSummary, DeployError> {
    let deployment = Deployment::new(context);
    emit_last(&deployment, on_event);

    on_event(PhaseEvent::Started(Phase::Preflight));
    let deployment = on_failure(Phase::Preflight, deployment.preflight(tc).await, on_event)?;
    emit_last(&deployment, on_event);

    on_event(PhaseEvent::Started(Phase::Tests));
    let deployment = on_failure(Phase::Tests, deployment.run_tests(tc).await, on_event)?;
    emit_last(&deployment, on_event);

    on_event(PhaseEvent::Started(Phase::ImagePublish));
    let deployment = on_failure(
        Phase::ImagePublish,
        deployment.publish_images(tc).await,
        on_event,
    )?;
    emit_last(&deployment, on_event);

    on_event(PhaseEvent::Started(Phase::InfraConvergence));
    let deployment = on_failure(
        Phase::InfraConvergence,
        deployment.converge_infra(tc).await,
        on_event,
    )?;
    emit_last(&deployment, on_event);

    on_event(PhaseEvent::Started(Phase::ApplicationDeploy));
    let deployment = on_failure(
        Phase::ApplicationDeploy,
        deployment.deploy_application(tc).await,
        on_event,
    )?;
    emit_last(&deployment, on_event);

    on_event(PhaseEvent::Started(Phase::Verification));
    let deployment = on_failure(Phase::Verification, deployment.verify(tc).await, on_event)?;
    emit_last(&deployment, on_event);

    on_event(PhaseEvent::Started(Phase::Report));
    let deployment = on_failure(Phase::Report, deployment.report(tc).await, on_event)?;
    emit_last(&deployment, on_event);

    Ok(deployment.finish())
}

/// Report a failed phase before handing the error back to the driver.
pub(crate) fn on_failure<T>(
    phase: Phase,
    result: Result<T, DeployError>,
    on_event: &mut dyn FnMut(PhaseEvent<'_>),
) -> Result<T, DeployError> {
    result.inspect_err(|e| {
        on_event(PhaseEvent::Finished(&PhaseResult::failed(phase, e.to_string())));
    })
}

fn emit_last<S>(deployment: &Deployment<S>, on_event: &mut dyn FnMut(PhaseEvent<'_>)) {
    if let Some(result) = deployment.last_result() {
        on_event(PhaseEvent::Finished(result));
    }
}
