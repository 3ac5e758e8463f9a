//! Mock gRPC store for harness integration testing.
//!
//! This module provides a controllable in-process implementation of the
//! store service so the harness machinery can be exercised without a real
//! cluster.
//!
//! # Features
//!
//! - **Login scripting**: fail the next N logins with a transient error, or
//!   deny logins outright
//! - **Readiness control**: flip the schema readiness flag directly or after
//!   a query threshold
//! - **Failure injection**: malformed readiness payloads, per-request delays
//! - **Request counting**: logins, queries, and mutations are tallied
//!
//! # Example
//!
//! ```no_run
//! use index_soak_client::mock::MockStoreServer;
//! use index_soak_client::{ClientConfig, Session};
//!
//! #[tokio::test]
//! async fn test_login() {
//!     let server = MockStoreServer::start().await.unwrap();
//!     server.set_login_transient_failures(3);
//!
//!     let config = ClientConfig::builder()
//!         .with_endpoint(server.endpoint().to_string())
//!         .with_credentials("groot", "password")
//!         .build()
//!         .unwrap();
//!
//!     let session = Session::connect(config).await.unwrap();
//!     assert_eq!(server.login_count(), 4);
//! }
//! ```

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use index_soak_proto::proto::{
    LoginRequest, LoginResponse, MutateRequest, MutateResponse, QueryRequest, QueryResponse,
    store_service_server::{StoreService, StoreServiceServer},
};
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tonic::{Request, Response, Status, transport::Server};

/// Default flag name reported by readiness payloads.
const DEFAULT_READY_FLAG: &str = "indexed";

/// Shared state for the mock server.
#[derive(Debug)]
struct MockState {
    /// Number of upcoming logins to fail with UNAVAILABLE.
    login_transient_failures: AtomicUsize,

    /// When set, all logins fail with UNAUTHENTICATED.
    login_denied: AtomicBool,

    /// Token generation; bumped by `revoke_tokens`.
    token_generation: AtomicU64,

    /// Whether queries and mutations require a valid access token.
    require_auth: AtomicBool,

    /// Schema readiness flag reported by queries.
    ready: AtomicBool,

    /// When non-zero, readiness flips true once this many queries have been
    /// served.
    ready_after_queries: AtomicUsize,

    /// Number of upcoming query responses to corrupt.
    malformed_payloads: AtomicUsize,

    /// Flag name used in readiness payloads.
    ready_flag: RwLock<String>,

    /// Delay to inject for each request (milliseconds).
    delay_ms: AtomicU64,

    /// Total login requests received.
    login_count: AtomicUsize,

    /// Total query requests received.
    query_count: AtomicUsize,

    /// Total mutations committed.
    mutation_count: AtomicU64,
}

impl MockState {
    fn new() -> Self {
        Self {
            login_transient_failures: AtomicUsize::new(0),
            login_denied: AtomicBool::new(false),
            token_generation: AtomicU64::new(0),
            require_auth: AtomicBool::new(true),
            ready: AtomicBool::new(false),
            ready_after_queries: AtomicUsize::new(0),
            malformed_payloads: AtomicUsize::new(0),
            ready_flag: RwLock::new(DEFAULT_READY_FLAG.to_owned()),
            delay_ms: AtomicU64::new(0),
            login_count: AtomicUsize::new(0),
            query_count: AtomicUsize::new(0),
            mutation_count: AtomicU64::new(0),
        }
    }

    /// Decrements a scripted-failure counter, returning true while it runs.
    fn consume_scripted(counter: &AtomicUsize) -> bool {
        loop {
            let current = counter.load(Ordering::SeqCst);
            if current == 0 {
                return false;
            }
            if counter
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Access token for the current generation.
    fn current_token(&self) -> String {
        format!("mock-access-token-{}", self.token_generation.load(Ordering::SeqCst))
    }

    /// Applies the configured delay, if any.
    async fn maybe_delay(&self) {
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    /// Verifies the bearer token on a request when auth is required.
    fn check_auth<T>(&self, request: &Request<T>) -> Result<(), Status> {
        if !self.require_auth.load(Ordering::SeqCst) {
            return Ok(());
        }

        let expected = format!("Bearer {}", self.current_token());
        match request.metadata().get("authorization") {
            Some(value) if value.to_str().is_ok_and(|v| v == expected) => Ok(()),
            Some(_) => Err(Status::unauthenticated("access token expired or invalid")),
            None => Err(Status::unauthenticated("missing access token")),
        }
    }
}

/// Mock implementation of the store service.
struct MockStoreService {
    state: Arc<MockState>,
}

#[tonic::async_trait]
impl StoreService for MockStoreService {
    async fn login(
        &self,
        _request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        self.state.maybe_delay().await;
        self.state.login_count.fetch_add(1, Ordering::SeqCst);

        if MockState::consume_scripted(&self.state.login_transient_failures) {
            return Err(Status::unavailable("cluster not ready: please retry"));
        }
        if self.state.login_denied.load(Ordering::SeqCst) {
            return Err(Status::unauthenticated("invalid credentials"));
        }

        Ok(Response::new(LoginResponse {
            access_token: self.state.current_token(),
            expires_in_secs: 0,
        }))
    }

    async fn query(
        &self,
        request: Request<QueryRequest>,
    ) -> Result<Response<QueryResponse>, Status> {
        self.state.maybe_delay().await;
        self.state.check_auth(&request)?;

        let served = self.state.query_count.fetch_add(1, Ordering::SeqCst) + 1;

        if MockState::consume_scripted(&self.state.malformed_payloads) {
            return Ok(Response::new(QueryResponse { json: b"{not json".to_vec() }));
        }

        let threshold = self.state.ready_after_queries.load(Ordering::SeqCst);
        let ready = self.state.ready.load(Ordering::SeqCst)
            || (threshold > 0 && served >= threshold);

        let payload = if ready {
            let flag = self.state.ready_flag.read().clone();
            serde_json::json!({ "schema": [ { flag: true } ] })
        } else {
            serde_json::json!({ "schema": [] })
        };

        Ok(Response::new(QueryResponse { json: payload.to_string().into_bytes() }))
    }

    async fn mutate(
        &self,
        request: Request<MutateRequest>,
    ) -> Result<Response<MutateResponse>, Status> {
        self.state.maybe_delay().await;
        self.state.check_auth(&request)?;

        if request.get_ref().payload.is_empty() {
            return Err(Status::invalid_argument("empty mutation payload"));
        }

        let txn_id = self.state.mutation_count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Response::new(MutateResponse { txn_id }))
    }
}

/// Controllable in-process store server.
///
/// Started on an ephemeral port; shut down when dropped (or explicitly via
/// [`stop`](Self::stop)).
pub struct MockStoreServer {
    state: Arc<MockState>,
    endpoint: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockStoreServer {
    /// Starts a new mock server on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`](crate::ClientError) if binding
    /// fails.
    pub async fn start() -> crate::Result<Self> {
        Self::start_on_port(0).await
    }

    /// Starts a new mock server on a specific port.
    ///
    /// Use port 0 to let the OS assign an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`](crate::ClientError) if binding
    /// fails.
    pub async fn start_on_port(port: u16) -> crate::Result<Self> {
        let state = Arc::new(MockState::new());

        let addr: SocketAddr = ([127, 0, 0, 1], port).into();
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            crate::error::ConnectionSnafu { message: format!("Failed to bind: {e}") }.build()
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            crate::error::ConnectionSnafu { message: format!("Failed to get local addr: {e}") }
                .build()
        })?;

        let endpoint = format!("http://{local_addr}");

        let service = MockStoreService { state: state.clone() };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
        tokio::spawn(async move {
            let result = Server::builder()
                .add_service(StoreServiceServer::new(service))
                .serve_with_incoming_shutdown(incoming, async {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = result {
                tracing::error!("Mock server error: {}", e);
            }
        });

        Ok(Self { state, endpoint, shutdown_tx: Some(shutdown_tx) })
    }

    /// Returns the endpoint URL for connecting to this server.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fails the next `count` login requests with UNAVAILABLE.
    pub fn set_login_transient_failures(&self, count: usize) {
        self.state.login_transient_failures.store(count, Ordering::SeqCst);
    }

    /// Makes all login requests fail with UNAUTHENTICATED.
    pub fn deny_logins(&self, denied: bool) {
        self.state.login_denied.store(denied, Ordering::SeqCst);
    }

    /// Invalidates previously issued access tokens.
    ///
    /// Requests carrying an old token fail with UNAUTHENTICATED until the
    /// client re-authenticates.
    pub fn revoke_tokens(&self) {
        self.state.token_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Enables or disables access-token checking (enabled by default).
    pub fn set_require_auth(&self, required: bool) {
        self.state.require_auth.store(required, Ordering::SeqCst);
    }

    /// Sets the schema readiness flag reported by queries.
    pub fn set_ready(&self, ready: bool) {
        self.state.ready.store(ready, Ordering::SeqCst);
    }

    /// Reports readiness once this many queries have been served.
    ///
    /// Zero disables the threshold.
    pub fn set_ready_after_queries(&self, count: usize) {
        self.state.ready_after_queries.store(count, Ordering::SeqCst);
    }

    /// Corrupts the next `count` query payloads.
    pub fn set_malformed_payloads(&self, count: usize) {
        self.state.malformed_payloads.store(count, Ordering::SeqCst);
    }

    /// Sets the flag name used in readiness payloads.
    pub fn set_ready_flag(&self, flag: &str) {
        *self.state.ready_flag.write() = flag.to_owned();
    }

    /// Sets a delay injected before serving each request.
    pub fn set_delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Total login requests received.
    #[must_use]
    pub fn login_count(&self) -> usize {
        self.state.login_count.load(Ordering::SeqCst)
    }

    /// Total query requests received.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.state.query_count.load(Ordering::SeqCst)
    }

    /// Total mutations committed.
    #[must_use]
    pub fn mutation_count(&self) -> u64 {
        self.state.mutation_count.load(Ordering::SeqCst)
    }

    /// Shuts the server down.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockStoreServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn scripted_counter_drains_to_zero() {
        let counter = AtomicUsize::new(2);

        assert!(MockState::consume_scripted(&counter));
        assert!(MockState::consume_scripted(&counter));
        assert!(!MockState::consume_scripted(&counter));
        assert!(!MockState::consume_scripted(&counter));
    }

    #[test]
    fn token_generation_changes_on_revoke() {
        let state = MockState::new();
        let before = state.current_token();
        state.token_generation.fetch_add(1, Ordering::SeqCst);
        assert_ne!(before, state.current_token());
    }

    #[tokio::test]
    async fn server_starts_on_ephemeral_port() {
        let server = MockStoreServer::start().await.expect("start mock");
        assert!(server.endpoint().starts_with("http://127.0.0.1:"));
    }
}
