//! Shutdown coordination.

use tokio::sync::broadcast;

/// Fans a single shutdown trigger out to every long-running task.
///
/// The server subscribes before it starts serving; the signal task triggers.
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

    /// Returns false when nobody was listening.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the coordinator fires or is dropped.
pub async fn notified(mut rx: broadcast::Receiver<()>) {
    // Lagged or closed both mean shutdown.
    let _ = rx.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let first = tokio::spawn(notified(shutdown.subscribe()));
        let second = tokio::spawn(notified(shutdown.subscribe()));
        assert_eq!(shutdown.receiver_count(), 2);

        assert!(shutdown.trigger());
        tokio::time::timeout(Duration::from_secs(1), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_without_listeners() {
        assert!(!Shutdown::new().trigger());
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(1), notified(rx))
            .await
            .unwrap();
    }
}
