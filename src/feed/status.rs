//! Connectivity status notifier.
//!
//! A thin pass-through around a watch channel: the streaming client pushes
//! boolean transitions, consumers observe the latest value or subscribe for
//! changes. No buffering, no history.

use tokio::sync::watch;

pub struct ConnectionStatus {
    tx: watch::Sender<bool>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatus {
    /// Starts disconnected.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn set(&self, connected: bool) {
        // send_if_modified so repeated identical transitions don't wake
        // subscribers.
        self.tx.send_if_modified(|cur| {
            if *cur != connected {
                *cur = connected;
                true
            } else {
                false
            }
        });
    }

    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_value_only() {
        let status = ConnectionStatus::new();
        assert!(!status.get());
        status.set(true);
        assert!(status.get());
        status.set(false);
        status.set(false);
        assert!(!status.get());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let status = ConnectionStatus::new();
        let mut rx = status.subscribe();
        status.set(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
