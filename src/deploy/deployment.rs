// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Holds the immutable context and the append-only phase log across transitions.

use chrono::{DateTime, Utc};

use super::context::DeploymentContext;
use super::state::Resolved;
use crate::report::{Phase, PhaseLog, PhaseResult};

/// A deployment in progress, parameterized by its current state.
///
/// Transitions consume the deployment and return it in the next state, so
/// phases cannot run out of order. The phase log travels with it.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) context: DeploymentContext,
    pub(crate) log: PhaseLog,
    pub(crate) started_at: DateTime<Utc>,
    /// How infrastructure convergence ended; set once it has run.
    pub(crate) infrastructure: Option<String>,
    pub(crate) state: S,
}

impl Deployment<Resolved> {
    /// Start a deployment. The resolved context is the first log entry.
    pub fn new(context: DeploymentContext) -> Self {
        let mut log = PhaseLog::default();
        log.record(PhaseResult::success(
            Phase::Resolve,
            format!(
                "{} (registry {}, resource group {}, tag {})",
                context.environment(),
                context.targets().registry_name,
                context.targets().resource_group,
                context.tag()
            ),
        ));
        Deployment {
            context,
            log,
            started_at: Utc::now(),
            infrastructure: None,
            state: Resolved,
        }
    }
}

impl<S> Deployment<S> {
    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    pub fn log(&self) -> &PhaseLog {
        &self.log
    }

    /// Most recently recorded phase result.
    pub fn last_result(&self) -> Option<&PhaseResult> {
        self.log.results().last()
    }

    pub fn infrastructure(&self) -> Option<&str> {
        self.infrastructure.as_deref()
    }
}
