// ABOUTME: Rollback command implementation.
// ABOUTME: Confirms production, then restores a published version via the rollback state machine.

use super::confirm;
use lakeship::deploy::{DeployError, PhaseEvent};
use lakeship::error::Result;
use lakeship::output::Output;
use lakeship::rollback::{self, Rollback};
use lakeship::tools::Toolchain;
use lakeship::types::{DeploymentTag, Environment};
use std::io::BufRead;

#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub environment: String,
    pub version: String,
    /// Skip the production prompt.
    pub yes: bool,
}

/// Roll an environment back to a previously published version.
pub async fn rollback<R>(
    request: RollbackRequest,
    tc: &Toolchain<'_>,
    mut output: Output,
    input: R,
) -> Result<()>
where
    R: BufRead + Send + 'static,
{
    output.start_timer();

    let environment: Environment = request
        .environment
        .parse()
        .map_err(DeployError::from)?;
    let version = DeploymentTag::new(&request.version).map_err(DeployError::from)?;

    let confirmed = request.yes
        || !environment.is_production()
        || confirm(
            &format!("You are about to roll {} back to {}.", environment, version),
            input,
            tc.interrupt(),
        )
        .await?;

    let start = Rollback::new(
        environment,
        version,
        tc.config().targets_for(environment),
        confirmed,
    )?;

    output.progress(&format!(
        "Rolling back {} to {}",
        start.environment(),
        start.version()
    ));

    let summary = rollback::run(start, tc, &mut |event| match event {
        PhaseEvent::Started(phase) => output.phase_started(phase),
        PhaseEvent::Finished(result) => output.phase_finished(result),
    })
    .await?;

    output.progress(&format!("  Report: {}", summary.report.display()));
    let warnings = summary.warnings().count();
    if warnings == 0 {
        output.success(&format!(
            "Rolled back {} to {}",
            summary.environment, summary.version
        ));
    } else {
        output.success(&format!(
            "Rolled back {} to {} with {} warning(s); review the report",
            summary.environment, summary.version, warnings
        ));
    }
    Ok(())
}
