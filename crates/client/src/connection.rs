//! Connection pool and channel management.
//!
//! Manages a tonic gRPC channel that balances requests across every
//! configured cluster endpoint, with lazy connection establishment.
//!
//! # Architecture
//!
//! The [`ConnectionPool`] wraps a tonic [`Channel`] with:
//! - **Client-side load balancing**: one logical channel spreads requests
//!   across all endpoints via [`Channel::balance_list`]
//! - **Lazy connection**: endpoints are dialed on first use, not at
//!   construction, so an unreachable node never fails pool creation
//! - **Shared ownership**: the channel is cached behind `Arc<RwLock<...>>`
//!   and cheap to clone for concurrent callers

use std::time::Duration;

use std::sync::Arc;

use parking_lot::RwLock;
use tonic::transport::{Channel, Endpoint};

use crate::config::ClientConfig;
use crate::error::{InvalidUrlSnafu, Result};

/// HTTP/2 keep-alive interval for idle connections.
const HTTP2_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// HTTP/2 keep-alive timeout.
const HTTP2_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP keepalive interval.
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Connection pool managing the load-balanced store channel.
///
/// The underlying tonic [`Channel`] is cheap to clone (clones share the
/// connection set internally), so this pool caches a single balanced channel
/// handed out to every caller.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    /// Cached channel, lazily initialized.
    channel: Arc<RwLock<Option<Channel>>>,

    /// Client configuration for connection settings.
    config: ClientConfig,
}

impl ConnectionPool {
    /// Creates a new connection pool with the given configuration.
    ///
    /// The pool does not dial any endpoint; connections are established
    /// lazily when the first request goes out through
    /// [`get_channel`](Self::get_channel).
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { channel: Arc::new(RwLock::new(None)), config }
    }

    /// Returns the balanced channel, building it if needed.
    ///
    /// Building the channel parses and configures every endpoint but does
    /// not wait for any of them to become reachable; unreachable members are
    /// tolerated and resolved by subsequent requests. Must be called from
    /// within a tokio runtime; the balancer spawns its connection worker
    /// there.
    ///
    /// # Errors
    ///
    /// Returns an error only if an endpoint URL fails to parse.
    pub fn get_channel(&self) -> Result<Channel> {
        // Fast path: channel already built
        {
            let guard = self.channel.read();
            if let Some(channel) = guard.as_ref() {
                return Ok(channel.clone());
            }
        }

        let new_channel = self.build_channel()?;

        {
            let mut guard = self.channel.write();
            // Double-check pattern: another task might have built it while we waited
            if let Some(channel) = guard.as_ref() {
                return Ok(channel.clone());
            }
            *guard = Some(new_channel.clone());
        }

        Ok(new_channel)
    }

    /// Builds the balanced channel over all configured endpoints.
    fn build_channel(&self) -> Result<Channel> {
        let mut endpoints = Vec::with_capacity(self.config.endpoints.len());
        for url in &self.config.endpoints {
            let endpoint = Endpoint::try_from(url.clone()).map_err(|_| {
                InvalidUrlSnafu {
                    url: url.clone(),
                    message: "Failed to parse as tonic endpoint".to_string(),
                }
                .build()
            })?;
            endpoints.push(self.configure_endpoint(endpoint));
        }

        // balance_list distributes individual requests across all members
        // and connects to each lazily.
        Ok(Channel::balance_list(endpoints.into_iter()))
    }

    /// Applies configuration settings to an endpoint.
    fn configure_endpoint(&self, endpoint: Endpoint) -> Endpoint {
        endpoint
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.timeout)
            .tcp_nodelay(true)
            .tcp_keepalive(Some(TCP_KEEPALIVE_INTERVAL))
            .http2_keep_alive_interval(HTTP2_KEEPALIVE_INTERVAL)
            .keep_alive_timeout(HTTP2_KEEPALIVE_TIMEOUT)
            .keep_alive_while_idle(true)
    }

    /// Returns a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Clears the cached channel, forcing a rebuild on next use.
    pub fn reset(&self) {
        let mut guard = self.channel.write();
        *guard = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig::builder()
            .with_endpoints([
                "http://localhost:9180",
                "http://localhost:9182",
                "http://localhost:9183",
            ])
            .with_credentials("groot", "password")
            .build()
            .expect("valid test config")
    }

    #[test]
    fn pool_creation_does_not_connect() {
        let pool = ConnectionPool::new(test_config());

        // Channel should be None initially (lazy construction)
        let guard = pool.channel.read();
        assert!(guard.is_none(), "channel should be None before first use");
    }

    #[tokio::test]
    async fn get_channel_succeeds_with_unreachable_endpoints() {
        // No server is listening on any of these ports; building the
        // balanced channel must still succeed because dialing is lazy.
        let pool = ConnectionPool::new(test_config());
        let result = pool.get_channel();

        assert!(result.is_ok(), "channel construction must not dial eagerly");
    }

    #[tokio::test]
    async fn channel_is_cached_after_first_get() {
        let pool = ConnectionPool::new(test_config());

        assert!(pool.channel.read().is_none());
        pool.get_channel().expect("build channel");
        assert!(pool.channel.read().is_some(), "channel should be cached");
    }

    #[tokio::test]
    async fn reset_clears_cached_channel() {
        let pool = ConnectionPool::new(test_config());

        pool.get_channel().expect("build channel");
        assert!(pool.channel.read().is_some());

        pool.reset();
        assert!(pool.channel.read().is_none());
    }

    #[test]
    fn pool_config_accessor_returns_config() {
        let config = test_config();
        let pool = ConnectionPool::new(config.clone());

        assert_eq!(pool.config().identity(), config.identity());
        assert_eq!(pool.config().endpoints(), config.endpoints());
    }
}
