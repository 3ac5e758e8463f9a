//! Session tests against the in-process mock store.
//!
//! These cover the connector contract: transient login failures are retried
//! with fixed backoff, permanent failures abort after a single attempt, and
//! an established session survives token revocation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use index_soak_client::mock::MockStoreServer;
use index_soak_client::{ClientConfig, ClientError, LoginPolicy, Session};
use tonic::Code;

/// Login policy with a short backoff so tests stay fast.
fn fast_login_policy() -> LoginPolicy {
    LoginPolicy::default().with_backoff(Duration::from_millis(20))
}

fn config_for(server: &MockStoreServer) -> ClientConfig {
    ClientConfig::builder()
        .with_endpoint(server.endpoint().to_string())
        .with_credentials("groot", "password")
        .with_timeout(Duration::from_secs(5))
        .with_connect_timeout(Duration::from_secs(1))
        .with_login_policy(fast_login_policy())
        .build()
        .expect("valid config")
}

#[tokio::test]
async fn login_retries_transient_failures_then_succeeds() {
    let server = MockStoreServer::start().await.expect("start mock");
    server.set_login_transient_failures(3);

    let session = Session::connect(config_for(&server)).await.expect("login succeeds");

    // 3 transient failures + 1 success
    assert_eq!(server.login_count(), 4);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn login_permanent_error_aborts_after_one_attempt() {
    let server = MockStoreServer::start().await.expect("start mock");
    server.deny_logins(true);

    let result = Session::connect(config_for(&server)).await;

    let err = result.expect_err("login must fail");
    assert_eq!(err.code(), Some(Code::Unauthenticated));
    assert_eq!(server.login_count(), 1, "no retry on permanent failure");
}

#[tokio::test]
async fn login_attempt_cap_is_honored() {
    let server = MockStoreServer::start().await.expect("start mock");
    server.set_login_transient_failures(10);

    let config = ClientConfig::builder()
        .with_endpoint(server.endpoint().to_string())
        .with_credentials("groot", "password")
        .with_login_policy(fast_login_policy().with_max_attempts(3))
        .build()
        .expect("valid config");

    let result = Session::connect(config).await;

    assert!(matches!(result, Err(ClientError::Rpc { code: Code::Unavailable, .. })));
    assert_eq!(server.login_count(), 3);
}

#[tokio::test]
async fn query_returns_raw_json_payload() {
    let server = MockStoreServer::start().await.expect("start mock");
    server.set_ready(true);

    let session = Session::connect(config_for(&server)).await.expect("login succeeds");
    let json = session.query("schema(attr: [name]) { indexed }").await.expect("query ok");

    let value: serde_json::Value = serde_json::from_slice(&json).expect("payload is JSON");
    assert_eq!(value["schema"][0]["indexed"], serde_json::Value::Bool(true));
}

#[tokio::test]
async fn mutate_commits_and_counts() {
    let server = MockStoreServer::start().await.expect("start mock");

    let session = Session::connect(config_for(&server)).await.expect("login succeeds");

    let first = session.mutate(b"<_:a> <name> \"alice\" .".to_vec()).await.expect("mutate ok");
    let second = session.mutate(b"<_:b> <name> \"bob\" .".to_vec()).await.expect("mutate ok");

    assert_eq!(first, 1);
    assert_eq!(second, 2);
    assert_eq!(server.mutation_count(), 2);
}

#[tokio::test]
async fn revoked_token_is_refreshed_transparently() {
    let server = MockStoreServer::start().await.expect("start mock");
    server.set_ready(true);

    let session = Session::connect(config_for(&server)).await.expect("login succeeds");
    assert_eq!(server.login_count(), 1);

    server.revoke_tokens();

    // First attempt fails UNAUTHENTICATED, session refreshes and replays.
    session.query("schema(attr: [name]) { indexed }").await.expect("query after revoke");
    assert_eq!(server.login_count(), 2, "exactly one refresh login");

    session.mutate(b"<_:c> <name> \"carol\" .".to_vec()).await.expect("mutate after refresh");
    assert_eq!(server.login_count(), 2, "refreshed token is reused");
}

#[tokio::test]
async fn unreachable_endpoints_are_tolerated_at_connect_time() {
    let server = MockStoreServer::start().await.expect("start mock");

    // Nothing listens on port 1; the balanced channel must still serve
    // requests through the live member.
    let config = ClientConfig::builder()
        .with_endpoints([server.endpoint().to_string(), "http://127.0.0.1:1".to_string()])
        .with_credentials("groot", "password")
        .with_login_policy(fast_login_policy())
        .build()
        .expect("valid config");

    let session = Session::connect(config).await.expect("login via live member");
    assert!(session.is_authenticated());
}
