// ABOUTME: Tests for the post-run webhook notification.
// ABOUTME: Uses a one-shot local HTTP listener; failures must only ever warn.

mod support;

use lakeship::config::EnvValue;
use lakeship::deploy::{self, DeployFlags, DeploymentContext};
use lakeship::report::{Phase, WarningKind};
use lakeship::types::{DeploymentTag, Environment};
use support::{Harness, Project};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Accept one request, answer with `status`, and return the raw request text.
async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            status
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });
    (url, handle)
}

fn harness_with_webhook(url: &str) -> Harness {
    let mut h = Harness::new(Project::new().with_health_check());
    h.config.notifications.webhook = Some(EnvValue::Literal(url.to_string()));
    h
}

async fn deploy_dev(h: &Harness) -> deploy::DeploymentSummary {
    let context = DeploymentContext::new(
        Environment::Dev,
        DeploymentTag::new("abc1234").unwrap(),
        DeployFlags::default(),
        &h.config,
    );
    let tc = h.tc();
    deploy::run(context, &tc, &mut |_| {}).await.unwrap()
}

fn report_warnings(summary: &deploy::DeploymentSummary) -> Vec<WarningKind> {
    summary
        .warnings()
        .filter(|(p, _)| *p == Phase::Report)
        .map(|(_, w)| w.kind)
        .collect()
}

#[tokio::test]
async fn posts_summary_to_webhook() {
    let (url, server) = one_shot_server("200 OK").await;
    let h = harness_with_webhook(&url);

    let summary = deploy_dev(&h).await;

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /hook"));
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let payload: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(payload["environment"], "dev");
    assert_eq!(payload["version"], "abc1234");
    assert_eq!(payload["kind"], "deployment");
    assert_eq!(payload["status"], "success");
    assert!(report_warnings(&summary).is_empty());
}

#[tokio::test]
async fn webhook_error_status_is_a_warning() {
    let (url, server) = one_shot_server("500 Internal Server Error").await;
    let h = harness_with_webhook(&url);

    let summary = deploy_dev(&h).await;
    server.await.unwrap();

    assert_eq!(report_warnings(&summary), vec![WarningKind::NotificationFailed]);
    assert_eq!(h.project.reports().len(), 1);
}

#[tokio::test]
async fn unreachable_webhook_is_a_warning() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let h = harness_with_webhook(&format!("http://127.0.0.1:{}/hook", port));

    let summary = deploy_dev(&h).await;

    assert_eq!(report_warnings(&summary), vec![WarningKind::NotificationFailed]);
    assert!(summary.report.is_some());
}
