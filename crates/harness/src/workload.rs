//! Concurrent mutation workload.
//!
//! Drives random record mutations at the store from a pool of workers until
//! a shared budget is exhausted or the run is stopped. Every successfully
//! committed mutation bumps the shared progress counter sampled by the
//! stats reporter.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use index_soak_client::Session;
use tracing::{debug, warn};

use crate::quit::QuitSignal;

/// Concurrent mutation generator.
///
/// Workers claim tickets from a shared budget and submit one mutation per
/// ticket. The progress counter only reflects mutations the store
/// acknowledged; it is an approximate, eventually-consistent progress
/// indicator, not a synchronization point.
#[derive(Debug)]
pub struct MutationWorkload {
    session: Session,
    attribute: String,
    workers: usize,
    budget: u64,
    counter: Arc<AtomicU64>,
    quit: QuitSignal,
}

impl MutationWorkload {
    /// Creates a workload of `workers` concurrent submitters sharing a
    /// `budget` of mutations against `attribute`.
    #[must_use]
    pub fn new(
        session: Session,
        attribute: impl Into<String>,
        workers: usize,
        budget: u64,
        counter: Arc<AtomicU64>,
        quit: QuitSignal,
    ) -> Self {
        Self {
            session,
            attribute: attribute.into(),
            workers: workers.max(1),
            budget,
            counter,
            quit,
        }
    }

    /// Runs the workload to completion and returns the committed count.
    ///
    /// Completion means the budget drained, the quit signal fired, or every
    /// worker stopped after exhausting its mutation retries. Mutation
    /// failures never panic the run; a failing worker logs and stops,
    /// leaving the counter at whatever actually committed.
    pub async fn run(self) -> u64 {
        let issued = Arc::new(AtomicU64::new(0));

        let workers: Vec<_> = (0..self.workers)
            .map(|worker| {
                let session = self.session.clone();
                let attribute = self.attribute.clone();
                let issued = issued.clone();
                let counter = self.counter.clone();
                let quit = self.quit.clone();
                let budget = self.budget;

                tokio::spawn(async move {
                    loop {
                        if quit.is_signaled() {
                            debug!(worker, "stop requested, worker exiting");
                            break;
                        }
                        let ticket = issued.fetch_add(1, Ordering::Relaxed);
                        if ticket >= budget {
                            break;
                        }

                        match session.mutate(random_record(&attribute)).await {
                            Ok(_) => {
                                counter.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(err) => {
                                warn!(worker, error = %err, "mutation failed, worker stopping");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        futures::future::join_all(workers).await;

        self.counter.load(Ordering::Relaxed)
    }
}

/// Generates one random record mutation for `attribute`.
fn random_record(attribute: &str) -> Vec<u8> {
    use rand::Rng;

    let mut rng = rand::rng();
    let subject: u32 = rng.random_range(0..1_000_000);
    let value: u64 = rng.random();

    format!("<_:u{subject:06}> <{attribute}> \"v{value:016x}\" .").into_bytes()
}
