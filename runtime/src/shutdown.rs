//! Graceful shutdown coordination.
//!
//! The coordinator owns the shutdown broadcast. Consumers and sweeps
//! subscribe to it; their join handles are tracked so shutdown can wait for
//! them, each bounded by the same timeout.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Shutdown broadcast plus the tasks listening to it.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<(String, JoinHandle<()>)>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Coordinator that waits at most `timeout` per task.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx,
            tasks: Vec::new(),
            timeout,
        }
    }

    /// Receiver notified when shutdown starts.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Track a task to drain on shutdown.
    pub fn track(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        let name = name.into();
        tracing::debug!(task = %name, "tracking background task");
        self.tasks.push((name, handle));
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Broadcast shutdown and wait for every tracked task.
    ///
    /// Returns the names of tasks that failed or timed out. A timed-out task
    /// is aborted.
    pub async fn shutdown(self) -> Vec<String> {
        tracing::info!(
            tasks = self.tasks.len(),
            timeout_secs = self.timeout.as_secs(),
            "Initiating graceful shutdown"
        );
        if self.shutdown_tx.send(()).is_err() {
            tracing::debug!("no shutdown receivers");
        }

        let mut failed = Vec::new();
        for (name, handle) in self.tasks {
            let abort = handle.abort_handle();
            match tokio::time::timeout(self.timeout, handle).await {
                Ok(Ok(())) => tracing::info!(task = %name, "task stopped gracefully"),
                Ok(Err(e)) => {
                    tracing::warn!(task = %name, error = %e, "task failed");
                    failed.push(name);
                }
                Err(_) => {
                    tracing::warn!(task = %name, "task shutdown timed out");
                    abort.abort();
                    failed.push(name);
                }
            }
        }
        failed
    }
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn wait_for_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
