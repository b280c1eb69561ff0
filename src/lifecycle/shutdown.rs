//! Shutdown coordination for the proxy.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// The HTTP server subscribes before it starts serving; `trigger` makes it
/// stop accepting and drain in-flight relays. Transformer calls already
/// spawned are not waited for.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `rx` fires or its sender is gone.
pub async fn wait(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_subscribers() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), wait(rx))
            .await
            .expect("subscriber woke");
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(1), wait(rx))
            .await
            .expect("waiter released");
    }
}
