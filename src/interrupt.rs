// ABOUTME: Cancellation token shared by every phase of a run.
// ABOUTME: Triggered once by the signal listener, checked at phase boundaries.

use std::future::pending;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Process-wide interruption flag.
///
/// Cloning is cheap; all clones observe the same flag. Once triggered it stays
/// triggered for the rest of the process.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Mark the run as interrupted.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token has been triggered.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without triggering: never resolves.
                pending::<()>().await;
            }
        }
    }

    /// Spawn the single signal listener for this process.
    ///
    /// SIGINT and SIGTERM (Ctrl+C elsewhere) trigger the token; the run notices
    /// at the next phase boundary or while awaiting a child process.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::warn!("interrupt received, stopping at the next safe point");
            token.trigger();
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut sigterm), Ok(mut sigint)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) else {
        tracing::warn!("failed to install signal handlers; interrupts will not be reported");
        return pending().await;
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("SIGTERM received"),
        _ = sigint.recv() => tracing::info!("SIGINT received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to listen for Ctrl+C; interrupts will not be reported");
        pending::<()>().await;
    }
}
