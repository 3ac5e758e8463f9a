//! Periodic progress reporting for a running workload.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

/// Background loop printing the mutation counter at a fixed interval.
///
/// Each tick samples the shared counter and writes one `mutations: <n>` line
/// to stdout. The loop never blocks longer than one interval between checks
/// of the quit signal; once quit fires it stops emitting and the returned
/// [`JoinHandle`] completes, which is how the owner waits for clean
/// shutdown.
#[derive(Debug)]
pub struct StatsReporter {
    counter: Arc<AtomicU64>,
    interval: Duration,
}

impl StatsReporter {
    /// Creates a reporter sampling `counter` every `interval`.
    #[must_use]
    pub fn new(counter: Arc<AtomicU64>, interval: Duration) -> Self {
        Self { counter, interval }
    }

    /// Spawns the reporting loop.
    ///
    /// The first line is printed one full interval after spawn, not
    /// immediately. Await the returned handle after signaling quit to
    /// confirm the loop exited.
    pub fn spawn(self, mut quit: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    // A closed channel means the owner is gone; stop either way.
                    _ = quit.recv() => {
                        debug!("progress reporting stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        println!("mutations: {}", self.counter.load(Ordering::Relaxed));
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::quit::QuitSignal;

    const TICK: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn stops_within_one_interval_of_quit() {
        let counter = Arc::new(AtomicU64::new(0));
        let quit = QuitSignal::new();
        let handle = StatsReporter::new(counter, TICK).spawn(quit.subscribe());

        // Let a few ticks elapse, then stop.
        tokio::time::sleep(TICK * 3).await;
        quit.signal();

        let joined = tokio::time::timeout(TICK * 2, handle).await;
        assert!(joined.is_ok(), "reporter must exit within one interval of quit");
    }

    #[tokio::test]
    async fn quit_before_first_tick_stops_immediately() {
        let counter = Arc::new(AtomicU64::new(0));
        let quit = QuitSignal::new();
        let handle = StatsReporter::new(counter, Duration::from_secs(3600)).spawn(quit.subscribe());

        quit.signal();

        let joined = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(joined.is_ok(), "quit wins against a pending long tick");
    }

    #[tokio::test]
    async fn counter_updates_are_observed() {
        let counter = Arc::new(AtomicU64::new(0));
        let quit = QuitSignal::new();
        let handle = StatsReporter::new(counter.clone(), TICK).spawn(quit.subscribe());

        counter.fetch_add(5, Ordering::Relaxed);
        tokio::time::sleep(TICK * 2).await;
        counter.fetch_add(7, Ordering::Relaxed);
        tokio::time::sleep(TICK * 2).await;

        quit.signal();
        handle.await.expect("reporter task completes");

        assert_eq!(counter.load(Ordering::Relaxed), 12);
    }

    #[tokio::test]
    async fn dropped_owner_stops_the_loop() {
        let counter = Arc::new(AtomicU64::new(0));
        let quit = QuitSignal::new();
        let handle = StatsReporter::new(counter, TICK).spawn(quit.subscribe());

        // Dropping the only sender closes the channel.
        drop(quit);

        let joined = tokio::time::timeout(TICK * 2, handle).await;
        assert!(joined.is_ok(), "reporter must not outlive its owner");
    }
}
