//! Authenticated store session.
//!
//! A [`Session`] is the product of the connector: a multi-endpoint,
//! load-balanced client handle that has completed login. It is cheap to
//! clone and safe to share across concurrent tasks; all clones use the same
//! balanced channel and access token.

use index_soak_proto::proto::store_service_client::StoreServiceClient;
use index_soak_proto::proto::{LoginRequest, MutateRequest, QueryRequest};
use tonic::Code;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Channel;
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthInterceptor, TokenCell},
    config::ClientConfig,
    connection::ConnectionPool,
    error::Result,
    retry::with_retry,
};

/// Store client carrying the auth interceptor.
type StoreClient = StoreServiceClient<InterceptedService<Channel, AuthInterceptor>>;

/// An authenticated, multi-endpoint client handle for one test run.
///
/// Created once by [`Session::connect`]; read-only afterwards except for
/// internal token refresh, which is concurrency-safe (see
/// [`TokenCell`]). Dropping the last clone closes the underlying
/// connections.
#[derive(Debug, Clone)]
pub struct Session {
    pool: ConnectionPool,
    tokens: TokenCell,
    config: ClientConfig,
}

impl Session {
    /// Connects to the cluster and authenticates.
    ///
    /// Connection establishment is lazy: endpoints that are momentarily
    /// unreachable do not fail this call. Login is retried with the
    /// configured fixed backoff while the failure is transient (the cluster
    /// is still initializing); any other login error aborts immediately.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid endpoint URLs, on a non-retriable login
    /// failure, or once the login attempt cap (if any) is reached.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let pool = ConnectionPool::new(config.clone());
        let session = Self { pool, tokens: TokenCell::new(), config };
        session.login().await?;
        Ok(session)
    }

    /// Logs in with fixed-backoff retry on transient errors.
    async fn login(&self) -> Result<()> {
        let policy = self.config.login_policy().clone();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.try_login().await {
                Ok(token) => {
                    self.tokens.store(token);
                    info!(attempts = attempt, "login succeeded");
                    return Ok(());
                }
                Err(err) if err.is_retryable() => {
                    if let Some(max) = policy.max_attempts
                        && attempt >= max
                    {
                        warn!(attempts = attempt, "login attempt cap reached");
                        return Err(err);
                    }
                    debug!(
                        error = %err,
                        attempt = attempt,
                        backoff_ms = policy.backoff.as_millis() as u64,
                        "store not ready for login, retrying"
                    );
                    tokio::time::sleep(policy.backoff).await;
                }
                Err(err) => {
                    warn!(error = %err, "login rejected");
                    return Err(err);
                }
            }
        }
    }

    /// Issues a single login request and returns the access token.
    async fn try_login(&self) -> Result<String> {
        let channel = self.pool.get_channel()?;
        let mut client = StoreServiceClient::new(channel);

        let request = LoginRequest {
            identity: self.config.identity.clone(),
            secret: self.config.secret.clone(),
        };
        let response = client.login(request).await?;

        Ok(response.into_inner().access_token)
    }

    /// Re-authenticates and replaces the stored access token.
    ///
    /// Safe to call from multiple tasks at once; the last writer wins and
    /// every subsequent request picks up a valid token.
    pub async fn refresh(&self) -> Result<()> {
        let token = self.try_login().await?;
        self.tokens.store(token);
        debug!("access token refreshed");
        Ok(())
    }

    /// Issues a read-only query and returns the raw JSON payload.
    ///
    /// An expired access token is refreshed once and the query replayed.
    ///
    /// # Errors
    ///
    /// Returns the RPC error as-is; the caller decides whether to retry.
    pub async fn query(&self, query: impl Into<String>) -> Result<Vec<u8>> {
        let query = query.into();
        match self.run_query(&query).await {
            Err(err) if err.code() == Some(Code::Unauthenticated) => {
                self.refresh().await?;
                self.run_query(&query).await
            }
            other => other,
        }
    }

    async fn run_query(&self, query: &str) -> Result<Vec<u8>> {
        let mut client = self.store_client()?;
        let request = QueryRequest { query: query.to_owned(), read_only: true };
        let response = client.query(request).await?;
        Ok(response.into_inner().json)
    }

    /// Submits one unit of mutation work, returning the assigned txn id.
    ///
    /// Transient failures are retried per the configured
    /// [`RetryPolicy`](crate::RetryPolicy); an expired access token is
    /// refreshed once and the submission replayed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RetryExhausted`](crate::ClientError) when the
    /// retry budget runs out, or the underlying error when it is permanent.
    pub async fn mutate(&self, payload: impl Into<Vec<u8>>) -> Result<u64> {
        let payload = payload.into();
        match self.submit(payload.clone()).await {
            Err(err) if err.code() == Some(Code::Unauthenticated) => {
                self.refresh().await?;
                self.submit(payload).await
            }
            other => other,
        }
    }

    async fn submit(&self, payload: Vec<u8>) -> Result<u64> {
        with_retry(self.config.retry_policy(), || {
            let session = self.clone();
            let payload = payload.clone();
            async move {
                let mut client = session.store_client()?;
                let response = client.mutate(MutateRequest { payload }).await?;
                Ok(response.into_inner().txn_id)
            }
        })
        .await
    }

    /// Returns the configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        self.pool.config().endpoints()
    }

    /// Returns whether the session currently holds an access token.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_set()
    }

    /// Builds a store client that attaches the current access token.
    fn store_client(&self) -> Result<StoreClient> {
        let channel = self.pool.get_channel()?;
        Ok(StoreServiceClient::with_interceptor(
            channel,
            AuthInterceptor::new(self.tokens.clone()),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig::builder()
            .with_endpoint("http://localhost:9180")
            .with_credentials("groot", "password")
            .build()
            .expect("valid test config")
    }

    #[test]
    fn clones_share_token_state() {
        let session = Session {
            pool: ConnectionPool::new(test_config()),
            tokens: TokenCell::new(),
            config: test_config(),
        };
        let clone = session.clone();

        assert!(!clone.is_authenticated());
        session.tokens.store("tok".to_owned());
        assert!(clone.is_authenticated());
    }

    #[test]
    fn endpoints_accessor_reflects_config() {
        let session = Session {
            pool: ConnectionPool::new(test_config()),
            tokens: TokenCell::new(),
            config: test_config(),
        };

        assert_eq!(session.endpoints(), ["http://localhost:9180"]);
    }
}
