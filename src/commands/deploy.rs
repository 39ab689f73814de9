// ABOUTME: Deploy command implementation.
// ABOUTME: Confirms production, resolves the context, and drives the deployment state machine.

use super::confirm;
use lakeship::deploy::{
    self, DeployError, DeployFlags, DeploymentContext, PhaseEvent, requires_confirmation,
    resolve_tag,
};
use lakeship::error::Result;
use lakeship::output::Output;
use lakeship::tools::Toolchain;
use lakeship::types::Environment;
use std::io::BufRead;

/// Operator input for one deploy run.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub environment: String,
    pub tag: Option<String>,
    pub flags: DeployFlags,
}

/// Deploy the platform to one environment.
pub async fn deploy<R>(
    request: DeployRequest,
    tc: &Toolchain<'_>,
    mut output: Output,
    input: R,
) -> Result<()>
where
    R: BufRead + Send + 'static,
{
    output.start_timer();

    // Nothing runs before the environment is known to be valid.
    let environment: Environment = request
        .environment
        .parse()
        .map_err(DeployError::from)?;

    if requires_confirmation(environment, request.flags)
        && !confirm(
            &format!("You are about to deploy to {}.", environment),
            input,
            tc.interrupt(),
        )
        .await?
    {
        return Err(DeployError::DeploymentCancelled.into());
    }

    let tag = resolve_tag(request.tag.as_deref(), tc).await?;
    let context = DeploymentContext::new(environment, tag, request.flags, tc.config());

    output.progress(&format!(
        "Deploying {} to {} (flags: {})",
        context.tag(),
        context.environment(),
        context.flags()
    ));

    let summary = deploy::run(context, tc, &mut |event| match event {
        PhaseEvent::Started(phase) => output.phase_started(phase),
        PhaseEvent::Finished(result) => output.phase_finished(result),
    })
    .await?;

    if let Some(ref path) = summary.report {
        output.progress(&format!("  Report: {}", path.display()));
    }

    let warnings = summary.warnings().count();
    let suffix = match warnings {
        0 => String::new(),
        1 => " with 1 warning".to_string(),
        n => format!(" with {} warnings", n),
    };
    if request.flags.dry_run {
        output.success(&format!(
            "Dry run for {} complete{}; nothing was changed",
            summary.context.environment(),
            suffix
        ));
    } else {
        output.success(&format!(
            "Deployed {} to {}{}",
            summary.context.tag(),
            summary.context.environment(),
            suffix
        ));
    }
    Ok(())
}
