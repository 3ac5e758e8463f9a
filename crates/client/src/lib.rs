//! Resilient store client for the index-soak harness.
//!
//! This crate provides the connector half of the harness: a multi-endpoint,
//! load-balanced, authenticated client session for driving load at a store
//! cluster under test.
//!
//! # Features
//!
//! - **Client-side load balancing**: one channel spread across every cluster
//!   member, tolerant of momentarily unreachable nodes
//! - **Resilient login**: fixed-backoff retry while the cluster initializes,
//!   immediate abort on rejected credentials
//! - **Token refresh**: expired access tokens are refreshed transparently,
//!   safe under concurrent use
//! - **Mock server**: a controllable in-process store for integration tests
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use index_soak_client::{ClientConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> index_soak_client::Result<()> {
//!     let config = ClientConfig::builder()
//!         .with_endpoints(["http://localhost:9180", "http://localhost:9182"])
//!         .with_credentials("groot", "password")
//!         .build()?;
//!
//!     let session = Session::connect(config).await?;
//!
//!     let json = session.query("schema(attr: [name]) { indexed }").await?;
//!     let txn = session.mutate(b"<_:a> <name> \"alice\" .".to_vec()).await?;
//!
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod connection;
mod error;
pub mod mock;
mod retry;
mod session;

// Public API exports
pub use auth::{AuthInterceptor, TokenCell};
pub use config::{
    ClientConfig, ClientConfigBuilder, LoginPolicy, RetryPolicy, RetryPolicyBuilder,
};
pub use connection::ConnectionPool;
pub use error::{ClientError, Result};
pub use retry::with_retry;
pub use session::Session;
