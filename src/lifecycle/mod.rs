//! Shutdown coordination.
//!
//! A broadcast channel all long-running tasks subscribe to. The accept
//! loop stops taking connections when the signal fires; in-flight
//! requests run to completion on their own tasks.

use tokio::sync::broadcast;

/// Graceful-shutdown coordinator.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before spawning the task that should observe shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the shutdown signal. Safe to call more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
