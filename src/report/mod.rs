// ABOUTME: Run reporting: phase results, persisted records, and notifications.
// ABOUTME: Exports PhaseLog, DeploymentRecord, and the webhook notifier.

mod notify;
mod phase;
mod record;

pub use notify::{NotificationPayload, Notifier, notify};
pub use phase::{Phase, PhaseLog, PhaseResult, PhaseStatus, Warning, WarningKind};
pub use record::{DeploymentRecord, RecordKind};
