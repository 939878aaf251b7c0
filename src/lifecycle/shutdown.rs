//! Shutdown coordination for the service.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that the server (and anything else long
/// running) subscribes to. Triggering is idempotent.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let receivers = self.tx.send(()).unwrap_or(0);
        tracing::info!(receivers, "Shutdown triggered");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once the shutdown signal arrives (or every sender is gone).
pub async fn wait(mut rx: broadcast::Receiver<()>) {
    // Lagged or Closed both mean shutdown has been requested or can never be.
    let _ = rx.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn subscribers_observe_trigger() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), wait(rx)).await.unwrap();
    }

    #[tokio::test]
    async fn dropped_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(1), wait(rx)).await.unwrap();
    }
}
