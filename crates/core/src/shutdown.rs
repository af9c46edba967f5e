//! Cooperative shutdown signal.
//!
//! A single `watch` channel flipped to `true` on Ctrl-C. Work in progress is
//! never interrupted mid-transaction; holders check the flag between steps.

use tokio::sync::watch;

/// Sending half, held by whoever decides to stop.
pub type ShutdownTrigger = watch::Sender<bool>;

/// Receiving half, cloned into every component that must stop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (tx, Shutdown { rx })
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if the trigger
    /// was dropped without firing.
    pub async fn requested(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_is_observed() {
        let (trigger, mut shutdown) = Shutdown::channel();
        assert!(!shutdown.is_requested());

        trigger.send(true).unwrap();
        assert!(shutdown.is_requested());
        tokio::time::timeout(Duration::from_millis(100), shutdown.requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_trigger_never_fires() {
        let (trigger, mut shutdown) = Shutdown::channel();
        drop(trigger);
        assert!(!shutdown.is_requested());
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown.requested()).await;
        assert!(waited.is_err());
    }
}
