//! Client configuration with builder pattern.
//!
//! Provides type-safe configuration for the store client including:
//! - Endpoint URLs for every cluster member
//! - Credentials used for login
//! - Timeouts and connection settings
//! - Login and request retry policies

use std::time::Duration;

use snafu::ensure;

use crate::error::{ConfigSnafu, InvalidUrlSnafu, Result};

/// Default request timeout (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default backoff between login attempts while the cluster initializes.
const DEFAULT_LOGIN_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for the store client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint URLs, one per cluster member (e.g., `http://localhost:9180`).
    pub(crate) endpoints: Vec<String>,

    /// Identity to authenticate as.
    pub(crate) identity: String,

    /// Shared secret for the identity.
    pub(crate) secret: String,

    /// Request timeout.
    pub(crate) timeout: Duration,

    /// Connection establishment timeout.
    pub(crate) connect_timeout: Duration,

    /// Login retry policy.
    pub(crate) login_policy: LoginPolicy,

    /// Retry policy for transient request failures.
    pub(crate) retry_policy: RetryPolicy,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Returns the login identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the login retry policy.
    #[must_use]
    pub fn login_policy(&self) -> &LoginPolicy {
        &self.login_policy
    }

    /// Returns the request retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    endpoints: Vec<String>,
    identity: Option<String>,
    secret: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    login_policy: Option<LoginPolicy>,
    retry_policy: Option<RetryPolicy>,
}

impl ClientConfigBuilder {
    /// Sets the endpoint URLs.
    ///
    /// At least one endpoint must be provided. URLs must be valid HTTP(S) URLs.
    /// All endpoints participate in client-side load balancing.
    #[must_use]
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a single endpoint URL.
    #[must_use]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn with_credentials<S: Into<String>, T: Into<String>>(
        mut self,
        identity: S,
        secret: T,
    ) -> Self {
        self.identity = Some(identity.into());
        self.secret = Some(secret.into());
        self
    }

    /// Sets the request timeout.
    ///
    /// Default: 30 seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection establishment timeout.
    ///
    /// Default: 5 seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the login retry policy.
    ///
    /// Default: [`LoginPolicy::default()`].
    #[must_use]
    pub fn with_login_policy(mut self, policy: LoginPolicy) -> Self {
        self.login_policy = Some(policy);
        self
    }

    /// Sets the retry policy for transient request failures.
    ///
    /// Default: [`RetryPolicy::default()`].
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Builds the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoints provided
    /// - Any endpoint URL is invalid
    /// - Identity is empty or not provided
    /// - Timeout or connect timeout is zero
    /// - Login backoff is zero
    pub fn build(self) -> Result<ClientConfig> {
        ensure!(
            !self.endpoints.is_empty(),
            ConfigSnafu { message: "at least one endpoint is required" }
        );

        for endpoint in &self.endpoints {
            validate_url(endpoint)?;
        }

        let identity = self
            .identity
            .ok_or_else(|| ConfigSnafu { message: "credentials are required" }.build())?;
        ensure!(!identity.is_empty(), ConfigSnafu { message: "identity cannot be empty" });

        let secret = self.secret.unwrap_or_default();

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        ensure!(!timeout.is_zero(), ConfigSnafu { message: "timeout cannot be zero" });

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        ensure!(
            !connect_timeout.is_zero(),
            ConfigSnafu { message: "connect_timeout cannot be zero" }
        );

        let login_policy = self.login_policy.unwrap_or_default();
        ensure!(
            !login_policy.backoff.is_zero(),
            ConfigSnafu { message: "login backoff cannot be zero" }
        );

        Ok(ClientConfig {
            endpoints: self.endpoints,
            identity,
            secret,
            timeout,
            connect_timeout,
            login_policy,
            retry_policy: self.retry_policy.unwrap_or_default(),
        })
    }
}

/// Login retry policy.
///
/// Login failures are classified by [`ClientError::is_retryable`]: transient
/// errors (the cluster is still initializing) are retried with a fixed
/// backoff, anything else aborts immediately. Retries are unbounded by
/// default; the enclosing test's own deadline bounds the wait externally.
///
/// [`ClientError::is_retryable`]: crate::ClientError::is_retryable
#[derive(Debug, Clone)]
pub struct LoginPolicy {
    /// Fixed backoff between attempts.
    pub backoff: Duration,

    /// Maximum number of attempts. `None` retries indefinitely.
    pub max_attempts: Option<u32>,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self { backoff: DEFAULT_LOGIN_BACKOFF, max_attempts: None }
    }
}

impl LoginPolicy {
    /// Sets the fixed backoff between attempts.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Caps the number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// Retry policy for transient request failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,

    /// Initial backoff duration before the first retry.
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential increase.
    pub multiplier: f64,

    /// Whether to apply random jitter to backoff delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<bool>,
}

impl RetryPolicyBuilder {
    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the initial backoff duration.
    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Sets the maximum backoff duration.
    #[must_use]
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Enables or disables backoff jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Builds the retry policy.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: self.initial_backoff.unwrap_or(defaults.initial_backoff),
            max_backoff: self.max_backoff.unwrap_or(defaults.max_backoff),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}

/// Validates that a URL is well-formed HTTP(S).
fn validate_url(url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return InvalidUrlSnafu { url, message: "URL must start with http:// or https://" }.fail();
    }

    let rest = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://")).unwrap_or("");

    if rest.is_empty() {
        return InvalidUrlSnafu { url, message: "URL must have a host" }.fail();
    }

    if rest.contains(char::is_whitespace) {
        return InvalidUrlSnafu { url, message: "URL cannot contain whitespace" }.fail();
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid_builder() -> ClientConfigBuilder {
        ClientConfig::builder()
            .with_endpoint("http://localhost:9180")
            .with_credentials("groot", "password")
    }

    #[test]
    fn build_with_defaults() {
        let config = valid_builder().build().expect("valid config");

        assert_eq!(config.endpoints(), ["http://localhost:9180"]);
        assert_eq!(config.identity(), "groot");
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.login_policy().backoff, DEFAULT_LOGIN_BACKOFF);
        assert!(config.login_policy().max_attempts.is_none());
    }

    #[test]
    fn build_requires_endpoints() {
        let result = ClientConfig::builder().with_credentials("groot", "password").build();
        assert!(result.is_err());
    }

    #[test]
    fn build_requires_credentials() {
        let result = ClientConfig::builder().with_endpoint("http://localhost:9180").build();
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_empty_identity() {
        let result = ClientConfig::builder()
            .with_endpoint("http://localhost:9180")
            .with_credentials("", "password")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_invalid_url() {
        let result = valid_builder().with_endpoint("localhost:9180").build();
        assert!(result.is_err());

        let result = valid_builder().with_endpoint("http://").build();
        assert!(result.is_err());

        let result = valid_builder().with_endpoint("http://bad host:1").build();
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_zero_timeouts() {
        let result = valid_builder().with_timeout(Duration::ZERO).build();
        assert!(result.is_err());

        let result = valid_builder().with_connect_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_zero_login_backoff() {
        let result = valid_builder()
            .with_login_policy(LoginPolicy::default().with_backoff(Duration::ZERO))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn endpoint_order_is_preserved() {
        let config = ClientConfig::builder()
            .with_endpoints(["http://a:1", "http://b:2", "http://c:3"])
            .with_credentials("groot", "password")
            .build()
            .expect("valid config");

        assert_eq!(config.endpoints(), ["http://a:1", "http://b:2", "http://c:3"]);
    }

    #[test]
    fn login_policy_caps_attempts() {
        let policy = LoginPolicy::default()
            .with_backoff(Duration::from_millis(10))
            .with_max_attempts(5);

        assert_eq!(policy.backoff, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, Some(5));
    }

    #[test]
    fn retry_policy_builder_defaults() {
        let policy = RetryPolicy::builder().with_max_attempts(7).build();

        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.initial_backoff, RetryPolicy::default().initial_backoff);
    }

    #[test]
    fn retry_policy_no_retry() {
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
