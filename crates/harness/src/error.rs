//! Harness error types.
//!
//! Only two things fail a run from inside the core: a non-retriable login
//! error during connect, and the readiness deadline expiring. Everything
//! else (transient infrastructure errors, malformed payloads, individual
//! mutation failures) is absorbed by the component loops.

use std::time::Duration;

use index_soak_client::ClientError;
use snafu::Snafu;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that fail a harness run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HarnessError {
    /// Connecting and authenticating against the cluster failed.
    #[snafu(display("login failed: {source}"))]
    Login {
        /// Underlying client error.
        source: ClientError,
    },

    /// The index build was not observed within the deadline.
    #[snafu(display("index build not observed within {timeout:?}"))]
    ReadinessTimeout {
        /// Deadline that expired.
        timeout: Duration,
    },

    /// The run was stopped externally before the index build completed.
    #[snafu(display("run interrupted before the index build completed"))]
    Interrupted,

    /// The readiness poller exited without delivering a signal.
    #[snafu(display("readiness poller exited without signaling"))]
    PollerExited,
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;

    #[test]
    fn login_error_carries_the_underlying_message() {
        let err = HarnessError::Login {
            source: ClientError::Rpc {
                code: Code::Unauthenticated,
                message: "invalid credentials".to_owned(),
            },
        };

        let rendered = err.to_string();
        assert!(rendered.contains("login failed"), "{rendered}");
        assert!(rendered.contains("invalid credentials"), "{rendered}");
    }

    #[test]
    fn readiness_timeout_names_the_deadline() {
        let err = HarnessError::ReadinessTimeout { timeout: Duration::from_secs(600) };
        assert!(err.to_string().contains("600"));
    }
}
