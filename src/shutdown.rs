//! Graceful Shutdown Handling
//!
//! Coordinates cancellation across the task generator, worker pool, health
//! monitor and result aggregator. Supports SIGTERM/SIGINT/Ctrl+C and
//! programmatic `stop()` calls; both paths converge on the same broadcast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::Result;

/// Coordinates global cancellation for one engine run.
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_complete: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            shutdown_complete: Arc::new(Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    /// A cloneable cancellation handle for a single component.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_tx.subscribe(),
            cancelled: self.cancelled.clone(),
        }
    }

    /// True once cancellation has fired, without subscribing a receiver.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Trigger cancellation. Idempotent and safe to call from any context
    /// (spec §4.1).
    pub fn stop(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("stop() called again; already cancelled");
            return;
        }
        info!("initiating graceful shutdown");
        // Receiver count of zero is expected once every component has
        // already observed cancellation; not an error.
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for SIGTERM, SIGINT, or Ctrl+C, then trigger cancellation.
    pub async fn listen_for_signals(&self) -> Result<()> {
        info!("starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
                _ = signal::ctrl_c() => info!("received Ctrl+C"),
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("received Ctrl+C");
        }

        self.stop();
        Ok(())
    }

    /// Block until `notify_complete` has been called or `timeout` elapses.
    pub async fn wait_for_completion(&self) -> Result<()> {
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, self.shutdown_complete.notified()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(elapsed = ?start.elapsed(), "shutdown timeout reached; draining best-effort");
                Ok(())
            }
        }
    }

    pub fn notify_complete(&self) {
        self.shutdown_complete.notify_waiters();
    }
}

/// Per-component handle into the shared cancellation broadcast.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    cancelled: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Resolves once cancellation has fired; resolves immediately if it
    /// already had, even if this handle missed the broadcast.
    pub async fn cancelled(&mut self) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.rx.recv().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Clone for ShutdownSignal {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.resubscribe(),
            cancelled: self.cancelled.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_is_idempotent() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        coordinator.stop();
        coordinator.stop();
        assert!(coordinator.is_cancelled());
    }

    #[tokio::test]
    async fn signal_resolves_after_stop() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let mut signal = coordinator.signal();
        coordinator.stop();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn late_subscriber_sees_cancellation_immediately() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        coordinator.stop();
        let mut signal = coordinator.signal();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }
}
