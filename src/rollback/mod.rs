// ABOUTME: Rollback orchestration using the type state pattern.
// ABOUTME: Restores a previously published version and records what happened.

mod state;
mod transitions;

pub use state::{
    Confirmed, ContainersRolledBack, InfraChecked, ModelsRolledBack, NotebooksRolledBack,
    Reported, VersionVerified, Verified,
};
pub use transitions::{Rollback, RollbackSummary};

use crate::deploy::{DeployError, PhaseEvent, on_failure};
use crate::report::Phase;
use crate::tools::Toolchain;

/// Run every rollback phase in order, reporting progress through `on_event`.
///
/// # Errors
///
/// Returns the first fatal error; phases after it never run.
pub async fn run(
    rollback: Rollback<Confirmed>,
    tc: &Toolchain<'_>,
    on_event: &mut dyn FnMut(PhaseEvent<'_>),
) -> Result<RollbackSummary, DeployError> {
    emit_last(rollback.last_result(), on_event);

    on_event(PhaseEvent::Started(Phase::VersionCheck));
    let rollback = on_failure(Phase::VersionCheck, rollback.verify_version(tc).await, on_event)?;
    emit_last(rollback.last_result(), on_event);

    on_event(PhaseEvent::Started(Phase::ContainerRollback));
    let rollback = on_failure(
        Phase::ContainerRollback,
        rollback.rollback_containers(tc).await,
        on_event,
    )?;
    emit_last(rollback.last_result(), on_event);

    on_event(PhaseEvent::Started(Phase::InfraCheck));
    let rollback = on_failure(Phase::InfraCheck, rollback.check_infra(tc).await, on_event)?;
    emit_last(rollback.last_result(), on_event);

    on_event(PhaseEvent::Started(Phase::NotebookRollback));
    let rollback = on_failure(
        Phase::NotebookRollback,
        rollback.rollback_notebooks(tc).await,
        on_event,
    )?;
    emit_last(rollback.last_result(), on_event);

    on_event(PhaseEvent::Started(Phase::ModelRollback));
    let rollback = on_failure(Phase::ModelRollback, rollback.rollback_models(tc).await, on_event)?;
    emit_last(rollback.last_result(), on_event);

    on_event(PhaseEvent::Started(Phase::Verification));
    let rollback = on_failure(Phase::Verification, rollback.verify(tc).await, on_event)?;
    emit_last(rollback.last_result(), on_event);

    on_event(PhaseEvent::Started(Phase::Report));
    let rollback = on_failure(Phase::Report, rollback.report(tc).await, on_event)?;
    emit_last(rollback.last_result(), on_event);

    Ok(rollback.finish())
}

fn emit_last(
    result: Option<&crate::report::PhaseResult>,
    on_event: &mut dyn FnMut(PhaseEvent<'_>),
) {
    if let Some(result) = result {
        on_event(PhaseEvent::Finished(result));
    }
}
