//! Schema-readiness polling.
//!
//! The store builds indexes in the background; the only externally
//! observable completion is a boolean flag on the attribute's schema
//! record. The [`ReadinessPoller`] queries that record at a fixed interval
//! and delivers a one-time signal the first time the flag reads true.

use std::collections::HashMap;
use std::time::Duration;

use index_soak_client::Session;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Notification that an attribute's readiness flag turned true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadySignal {
    /// Attribute whose index finished building.
    pub attribute: String,
    /// Flag that was observed true.
    pub flag: String,
}

/// Background loop watching one attribute's readiness flag.
///
/// The poller has two states: polling, and (after the first true verdict)
/// terminated. RPC failures and malformed payloads are non-fatal; the loop
/// skips to the next cycle. On satisfaction it sends exactly one
/// [`ReadySignal`] and returns, issuing no further queries. The oneshot
/// channel buffers the notification, so delivery never blocks on a busy
/// receiver.
#[derive(Debug)]
pub struct ReadinessPoller {
    session: Session,
    attribute: String,
    flag: String,
    poll_interval: Duration,
}

impl ReadinessPoller {
    /// Creates a poller for `attribute`'s `flag`, querying every
    /// `poll_interval`.
    #[must_use]
    pub fn new(
        session: Session,
        attribute: impl Into<String>,
        flag: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            attribute: attribute.into(),
            flag: flag.into(),
            poll_interval,
        }
    }

    /// Spawns the polling loop, delivering the signal on `tx`.
    pub fn spawn(self, tx: oneshot::Sender<ReadySignal>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(tx).await })
    }

    async fn run(self, tx: oneshot::Sender<ReadySignal>) {
        let query = format!("schema(attr: [{}]) {{ {} }}", self.attribute, self.flag);

        loop {
            tokio::time::sleep(self.poll_interval).await;

            let payload = match self.session.query(&query).await {
                Ok(payload) => payload,
                Err(err) => {
                    debug!(error = %err, attribute = %self.attribute, "readiness query failed, will retry");
                    continue;
                }
            };

            if ready_verdict(&payload, &self.flag) {
                debug!(attribute = %self.attribute, flag = %self.flag, "readiness flag observed true");
                // The receiver may already be gone if the run was abandoned.
                let _ = tx.send(ReadySignal { attribute: self.attribute, flag: self.flag });
                return;
            }

            trace!(attribute = %self.attribute, "not ready yet");
        }
    }
}

/// Schema query response: zero or more records mapping flag names to their
/// current boolean value.
#[derive(Debug, Deserialize)]
struct SchemaPayload {
    #[serde(default)]
    schema: Vec<HashMap<String, bool>>,
}

/// Decides whether a raw readiness payload reports `flag` as set.
///
/// Pure and deterministic: the same payload always yields the same verdict.
/// Malformed payloads, an empty record list, and an absent or false flag all
/// read as "not ready".
#[must_use]
pub fn ready_verdict(payload: &[u8], flag: &str) -> bool {
    let Ok(data) = serde_json::from_slice::<SchemaPayload>(payload) else {
        return false;
    };
    data.schema.iter().any(|record| record.get(flag).copied().unwrap_or(false))
}
