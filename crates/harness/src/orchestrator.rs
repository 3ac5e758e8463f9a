//! Run orchestration.
//!
//! Wires the session, workload, stats reporter, and readiness poller
//! together for one test run and guarantees clean teardown: the stats
//! reporter is always stopped and joined before the run reports its
//! outcome, so no background output survives the run.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

use index_soak_client::{ClientConfig, Session};
use snafu::ResultExt;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::{
    error::{InterruptedSnafu, LoginSnafu, PollerExitedSnafu, ReadinessTimeoutSnafu, Result},
    quit::QuitSignal,
    readiness::ReadinessPoller,
    stats::StatsReporter,
    workload::MutationWorkload,
};

/// Tunables for one harness run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Attribute whose index build is being validated.
    pub attribute: String,

    /// Readiness flag to watch on the attribute's schema record.
    pub flag: String,

    /// Total mutation budget for the workload.
    pub mutations: u64,

    /// Number of concurrent mutation workers.
    pub workers: usize,

    /// Interval between progress lines.
    pub stats_interval: Duration,

    /// Interval between readiness polls.
    pub poll_interval: Duration,

    /// Deadline for observing the index build after the workload drains.
    pub readiness_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            attribute: "name".to_owned(),
            flag: "indexed".to_owned(),
            mutations: 10_000,
            workers: 4,
            stats_interval: Duration::from_secs(2),
            poll_interval: Duration::from_secs(2),
            readiness_timeout: Duration::from_secs(600),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Mutations the store acknowledged.
    pub mutations: u64,

    /// Wall-clock duration of the run.
    pub elapsed: Duration,

    /// Attribute whose index build completed.
    pub attribute: String,

    /// Flag that was observed true.
    pub flag: String,
}

/// Composition point for one test run.
pub struct Orchestrator {
    client_config: ClientConfig,
    options: RunOptions,
    quit: QuitSignal,
}

impl Orchestrator {
    /// Creates an orchestrator for one run.
    #[must_use]
    pub fn new(client_config: ClientConfig, options: RunOptions) -> Self {
        Self { client_config, options, quit: QuitSignal::new() }
    }

    /// Returns a handle that stops the run early when signaled.
    ///
    /// The workload drains within one mutation per worker; the run then
    /// tears down and reports [`HarnessError::Interrupted`](crate::HarnessError).
    #[must_use]
    pub fn quit_signal(&self) -> QuitSignal {
        self.quit.clone()
    }

    /// Executes one run to completion.
    ///
    /// Sequence: connect and authenticate, start the background loops,
    /// drain the mutation budget, then wait for the readiness signal under
    /// the configured deadline. The stats reporter is stopped and joined
    /// before this returns, on every path.
    ///
    /// # Errors
    ///
    /// Fails on a non-retriable login error, on the readiness deadline
    /// expiring, or when the run is interrupted via
    /// [`quit_signal`](Self::quit_signal).
    pub async fn run(self) -> Result<RunReport> {
        let started = Instant::now();
        let options = self.options;

        info!(
            endpoints = ?self.client_config.endpoints(),
            attribute = %options.attribute,
            flag = %options.flag,
            "connecting to cluster"
        );
        let session = Session::connect(self.client_config).await.context(LoginSnafu)?;

        let counter = Arc::new(AtomicU64::new(0));
        let stats = StatsReporter::new(counter.clone(), options.stats_interval)
            .spawn(self.quit.subscribe());

        let (ready_tx, ready_rx) = oneshot::channel();
        let poller = ReadinessPoller::new(
            session.clone(),
            options.attribute.clone(),
            options.flag.clone(),
            options.poll_interval,
        )
        .spawn(ready_tx);

        let committed = MutationWorkload::new(
            session,
            options.attribute.clone(),
            options.workers,
            options.mutations,
            counter.clone(),
            self.quit.clone(),
        )
        .run()
        .await;
        info!(mutations = committed, "mutation workload drained");

        if self.quit.is_signaled() {
            warn!("run interrupted during workload");
            poller.abort();
            let _ = stats.await;
            return InterruptedSnafu.fail();
        }

        // The index build keeps going after the load stops; wait for the
        // poller under the run's deadline.
        let outcome = tokio::time::timeout(options.readiness_timeout, ready_rx).await;

        // Stop progress reporting before reporting the outcome either way.
        self.quit.signal();
        let _ = stats.await;

        match outcome {
            Ok(Ok(signal)) => {
                let _ = poller.await;
                let report = RunReport {
                    mutations: counter.load(Ordering::Relaxed),
                    elapsed: started.elapsed(),
                    attribute: signal.attribute,
                    flag: signal.flag,
                };
                info!(
                    mutations = report.mutations,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    attribute = %report.attribute,
                    "index build observed complete"
                );
                Ok(report)
            }
            Ok(Err(_)) => {
                // The poller only drops its sender after delivering, so this
                // is a poller crash.
                PollerExitedSnafu.fail()
            }
            Err(_) => {
                poller.abort();
                warn!(
                    timeout_ms = options.readiness_timeout.as_millis() as u64,
                    "readiness deadline expired"
                );
                ReadinessTimeoutSnafu { timeout: options.readiness_timeout }.fail()
            }
        }
    }
}
