//! Cooperative stop signaling for background loops.
//!
//! A [`QuitSignal`] broadcasts a one-time stop notification to every
//! subscribed loop. Loops either wait on a subscription (the stats reporter)
//! or poll [`is_signaled`](QuitSignal::is_signaled) between units of work
//! (the mutation workers).

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::broadcast;

/// Broadcast stop notification, delivered at most once.
///
/// Clones share the same signal; subscribing after the signal fired is
/// handled by checking [`is_signaled`](Self::is_signaled) first.
#[derive(Debug, Clone)]
pub struct QuitSignal {
    notify: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl QuitSignal {
    /// Creates a new, unfired quit signal.
    #[must_use]
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { notify, fired: Arc::new(AtomicBool::new(false)) }
    }

    /// Subscribes to quit notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Fires the signal.
    ///
    /// Idempotent: only the first call broadcasts.
    pub fn signal(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            // No receivers is fine; polling consumers observe `fired`.
            let _ = self.notify.send(());
        }
    }

    /// Returns whether the signal has fired.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Default for QuitSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_the_signal() {
        let quit = QuitSignal::new();
        let mut receiver = quit.subscribe();

        let quit_clone = quit.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            quit_clone.signal();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), receiver.recv()).await;
        assert!(result.is_ok(), "should receive quit signal");
        assert!(quit.is_signaled());
    }

    #[tokio::test]
    async fn signal_is_idempotent() {
        let quit = QuitSignal::new();
        let mut receiver = quit.subscribe();

        quit.signal();
        quit.signal();
        quit.signal();

        // Exactly one broadcast went out.
        receiver.recv().await.expect("first signal delivered");
        let second = tokio::time::timeout(Duration::from_millis(50), receiver.recv()).await;
        assert!(second.is_err(), "no second delivery");
    }

    #[test]
    fn is_signaled_starts_false() {
        let quit = QuitSignal::new();
        assert!(!quit.is_signaled());

        quit.signal();
        assert!(quit.is_signaled());
    }

    #[test]
    fn clones_observe_the_same_signal() {
        let quit = QuitSignal::new();
        let clone = quit.clone();

        quit.signal();
        assert!(clone.is_signaled());
    }
}
