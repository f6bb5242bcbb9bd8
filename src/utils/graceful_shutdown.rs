use std::{sync::OnceLock, time::Duration};

use tokio::{signal, sync::broadcast};

/// Why the gateway is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Requested from inside the process
    Requested,
}

/// Broadcasts a single shutdown signal to every interested task.
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<ShutdownReason>,
    /// Set once by the first trigger; late waiters read the reason here.
    reason: OnceLock<ShutdownReason>,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    /// Create a manager that gives in-flight requests 30 seconds to drain
    pub fn new() -> Self {
        Self::with_drain_timeout(Duration::from_secs(30))
    }

    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            shutdown_tx,
            reason: OnceLock::new(),
            drain_timeout,
        }
    }

    /// How long the server may keep draining connections after the signal
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.reason.get().is_some()
    }

    /// Trigger shutdown. Only the first call broadcasts; returns whether it did.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) -> bool {
        if self.reason.set(reason).is_err() {
            tracing::warn!(?reason, "Shutdown already initiated, ignoring signal");
            return false;
        }

        tracing::info!(?reason, "Shutdown initiated");
        // No receivers is fine: waiters check the stored reason first.
        let _ = self.shutdown_tx.send(reason);
        true
    }

    /// Listen for SIGINT / SIGTERM and trigger shutdown on the first one.
    pub async fn run_signal_handler(&self) {
        tracing::debug!("Signal handler started");

        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        let reason = tokio::select! {
            _ = ctrl_c => ShutdownReason::Interrupt,
            _ = wait_for_sigterm() => ShutdownReason::Terminate,
        };

        self.trigger_shutdown(reason);
    }

    /// Resolve once shutdown has been triggered, including before this call.
    pub async fn wait_for_shutdown_signal(&self) -> ShutdownReason {
        let mut receiver = self.subscribe();
        if let Some(reason) = self.reason.get() {
            return *reason;
        }

        match receiver.recv().await {
            Ok(reason) => reason,
            Err(e) => {
                tracing::warn!(error = %e, "Shutdown channel closed unexpectedly");
                ShutdownReason::Requested
            }
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
