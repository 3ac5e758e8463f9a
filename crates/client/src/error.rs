//! Client error types with retryability classification.
//!
//! Errors split into two classes:
//! - **Transient infrastructure errors**: node unreachable, cluster still
//!   initializing, timeouts. Callers retry these.
//! - **Permanent errors**: rejected credentials, malformed requests,
//!   configuration mistakes. Surfaced immediately.

use snafu::{Location, Snafu};
use tonic::Code;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types with context-rich error messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    /// Failed to establish connection.
    #[snafu(display("Connection error at {location}: {message}"))]
    Connection {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// Transport-level error (HTTP/2, TCP).
    #[snafu(display("Transport error at {location}: {source}"))]
    Transport {
        /// Underlying transport error.
        source: tonic::transport::Error,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// gRPC RPC error with status code.
    #[snafu(display("RPC error (code={code:?}): {message}"))]
    Rpc {
        /// gRPC status code.
        code: Code,
        /// Error message from server.
        message: String,
    },

    /// Retry attempts exhausted.
    #[snafu(display("Retry exhausted after {attempts} attempts: {last_error}"))]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message before giving up.
        last_error: String,
    },

    /// Configuration validation error.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// URL parsing error.
    #[snafu(display("Invalid URL '{url}': {message}"))]
    InvalidUrl {
        /// The invalid URL.
        url: String,
        /// Parse error description.
        message: String,
    },
}

impl ClientError {
    /// Returns true if the error is transient and the operation should be retried.
    ///
    /// Retryable errors:
    /// - `UNAVAILABLE`: Node unreachable or cluster still initializing
    /// - `DEADLINE_EXCEEDED`: Request timed out
    /// - `RESOURCE_EXHAUSTED`: Rate limited
    /// - `ABORTED`: Conflict that may succeed on retry
    /// - Transport/connection errors (network issues)
    ///
    /// Non-retryable errors:
    /// - `UNAUTHENTICATED` / `PERMISSION_DENIED`: Rejected credentials
    /// - `INVALID_ARGUMENT`: Request is malformed
    /// - Configuration and URL errors
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Connection { .. } => true,
            Self::Rpc { code, .. } => matches!(
                code,
                Code::Unavailable
                    | Code::DeadlineExceeded
                    | Code::ResourceExhausted
                    | Code::Aborted
            ),
            // Non-retryable
            Self::RetryExhausted { .. } => false,
            Self::Config { .. } => false,
            Self::InvalidUrl { .. } => false,
        }
    }

    /// Returns the gRPC status code if this is an RPC error.
    #[must_use]
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<tonic::transport::Error> for ClientError {
    fn from(source: tonic::transport::Error) -> Self {
        Self::Transport {
            source,
            location: Location::default(),
        }
    }
}

impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        Self::Rpc {
            code: status.code(),
            message: status.message().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_retryable_unavailable() {
        let err = ClientError::Rpc {
            code: Code::Unavailable,
            message: "cluster not ready".to_owned(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rpc_error_retryable_deadline_exceeded() {
        let err = ClientError::Rpc {
            code: Code::DeadlineExceeded,
            message: "timeout".to_owned(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rpc_error_retryable_resource_exhausted() {
        let err = ClientError::Rpc {
            code: Code::ResourceExhausted,
            message: "rate limited".to_owned(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rpc_error_non_retryable_unauthenticated() {
        let err = ClientError::Rpc {
            code: Code::Unauthenticated,
            message: "invalid credentials".to_owned(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rpc_error_non_retryable_permission_denied() {
        let err = ClientError::Rpc {
            code: Code::PermissionDenied,
            message: "access denied".to_owned(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rpc_error_non_retryable_invalid_argument() {
        let err = ClientError::Rpc {
            code: Code::InvalidArgument,
            message: "bad request".to_owned(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connection_error_is_retryable() {
        let err = ClientError::Connection {
            message: "connection refused".to_owned(),
            location: Location::default(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_error_not_retryable() {
        let err = ClientError::Config {
            message: "invalid config".to_owned(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_exhausted_not_retryable() {
        let err = ClientError::RetryExhausted {
            attempts: 3,
            last_error: "unavailable".to_owned(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_tonic_status() {
        let status = tonic::Status::unavailable("node down");
        let err: ClientError = status.into();
        assert!(matches!(err, ClientError::Rpc { code: Code::Unavailable, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_code_accessor() {
        let err = ClientError::Rpc {
            code: Code::NotFound,
            message: "not found".to_owned(),
        };
        assert_eq!(err.code(), Some(Code::NotFound));

        let err2 = ClientError::Config { message: "bad".to_owned() };
        assert_eq!(err2.code(), None);
    }
}
