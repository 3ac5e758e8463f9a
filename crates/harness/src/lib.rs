//! Soak-test orchestration harness for background index builds.
//!
//! The harness validates that a distributed store's background index build
//! converges while the store is under sustained mutation load. One run:
//!
//! 1. Connects an authenticated, load-balanced session to the cluster,
//!    retrying login while the cluster initializes.
//! 2. Spawns a [`StatsReporter`] printing workload progress and a
//!    [`ReadinessPoller`] watching the attribute's readiness flag.
//! 3. Drains a concurrent mutation budget through the session.
//! 4. Waits (bounded) for the poller's one-time readiness signal, then
//!    stops the reporter and returns a [`RunReport`].
//!
//! The [`Orchestrator`] composes these pieces; each is usable on its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod orchestrator;
mod quit;
mod readiness;
mod stats;
mod workload;

// Public API exports
pub use error::{HarnessError, Result};
pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use quit::QuitSignal;
pub use readiness::{ReadinessPoller, ReadySignal, ready_verdict};
pub use stats::StatsReporter;
pub use workload::MutationWorkload;
