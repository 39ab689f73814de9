// ABOUTME: Best-effort webhook notification sent after a record is written.
// ABOUTME: Failures become NotificationFailed warnings and never affect the exit status.

use super::phase::Warning;
use super::record::{DeploymentRecord, RecordKind};
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct NotificationPayload<'a> {
    pub text: String,
    pub kind: RecordKind,
    pub environment: &'a str,
    pub version: &'a str,
    pub status: &'static str,
    pub report: String,
}

impl<'a> NotificationPayload<'a> {
    pub fn for_record(record: &'a DeploymentRecord, report_path: &Path) -> Self {
        let status = if record.has_warnings() {
            "success_with_warnings"
        } else {
            "success"
        };
        let action = match record.kind {
            RecordKind::Deployment => "Deployment of",
            RecordKind::Rollback => "Rollback to",
        };
        let suffix = if record.has_warnings() {
            " with warnings"
        } else {
            ""
        };
        Self {
            text: format!(
                "{} {} on {} completed{}",
                action, record.version, record.environment, suffix
            ),
            kind: record.kind,
            environment: record.environment.as_str(),
            version: &record.version,
            status,
            report: report_path.display().to_string(),
        }
    }
}

/// Sends run notifications to a webhook URL.
pub struct Notifier {
    client: Client,
    url: String,
}

impl Notifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, Warning> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Warning::notification_failed(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// POST the payload as JSON. Any failure is returned as a warning.
    pub async fn send(&self, payload: &NotificationPayload<'_>) -> Result<(), Warning> {
        tracing::debug!("sending notification to webhook");

        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Warning::notification_failed(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Warning::notification_failed(format!(
                "webhook returned {}",
                status
            )));
        }

        Ok(())
    }
}

/// Notify if a webhook is configured. `Ok(false)` means nothing was sent.
pub async fn notify(
    url: Option<&str>,
    timeout: Duration,
    payload: &NotificationPayload<'_>,
) -> Result<bool, Warning> {
    let Some(url) = url else {
        tracing::debug!("no webhook configured, skipping notification");
        return Ok(false);
    };
    Notifier::new(url, timeout)?.send(payload).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Phase, PhaseResult};
    use crate::types::Environment;
    use chrono::Utc;

    fn record(kind: RecordKind, phases: Vec<PhaseResult>) -> DeploymentRecord {
        DeploymentRecord {
            kind,
            environment: Environment::Staging,
            version: "v1.2.3".to_string(),
            flags: None,
            targets: Environment::Staging.default_targets(),
            infrastructure: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            operator_host: "ci-runner".to_string(),
            phases,
            rollback_command: DeploymentRecord::rollback_command_for(
                Environment::Staging,
                "v1.2.3",
            ),
        }
    }

    #[test]
    fn payload_describes_a_clean_rollback() {
        let record = record(
            RecordKind::Rollback,
            vec![PhaseResult::success(Phase::VersionCheck, "found")],
        );
        let payload = NotificationPayload::for_record(&record, Path::new("reports/r.md"));

        assert_eq!(payload.text, "Rollback to v1.2.3 on staging completed");
        assert_eq!(payload.status, "success");
        assert_eq!(payload.report, "reports/r.md");
    }

    #[test]
    fn payload_flags_warnings() {
        let record = record(
            RecordKind::Deployment,
            vec![PhaseResult::completed(
                Phase::Verification,
                "health not confirmed",
                vec![Warning::tool_not_found("no health script")],
            )],
        );
        let payload = NotificationPayload::for_record(&record, Path::new("r.md"));

        assert_eq!(payload.status, "success_with_warnings");
        assert!(payload.text.ends_with("with warnings"));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "deployment");
    }

    #[tokio::test]
    async fn no_url_sends_nothing() {
        let record = record(RecordKind::Deployment, Vec::new());
        let payload = NotificationPayload::for_record(&record, Path::new("r.md"));

        let sent = notify(None, Duration::from_secs(1), &payload).await.unwrap();
        assert!(!sent);
    }
}
