//! Access-token storage and request authentication.
//!
//! After login, the store issues an access token that every subsequent
//! request must carry. The token lives in a [`TokenCell`] shared by all
//! clones of a session; refreshing it mid-run (e.g., after expiry) is safe
//! under concurrent use because readers and the refresher synchronize on a
//! `parking_lot::RwLock`.

use std::sync::Arc;

use parking_lot::RwLock;
use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;

/// Metadata key carrying the access token.
const AUTHORIZATION_KEY: &str = "authorization";

/// Shared slot holding the current access token.
///
/// Cloning a `TokenCell` yields a handle to the same slot, so a refresh
/// performed through any clone is visible to every request that follows.
#[derive(Debug, Clone, Default)]
pub struct TokenCell {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenCell {
    /// Creates an empty token cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new access token, replacing any previous one.
    pub fn store(&self, token: String) {
        let mut guard = self.token.write();
        *guard = Some(token);
    }

    /// Returns the current token formatted as a bearer credential.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        let guard = self.token.read();
        guard.as_ref().map(|token| format!("Bearer {token}"))
    }

    /// Returns whether a token is currently stored.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.token.read().is_some()
    }

    /// Discards the stored token.
    pub fn clear(&self) {
        let mut guard = self.token.write();
        *guard = None;
    }
}

/// Tonic interceptor that attaches the current access token to outgoing
/// requests as an `authorization: Bearer <token>` metadata entry.
///
/// Requests issued before login (the login call itself) go out without the
/// header; the server rejects them with `UNAUTHENTICATED` where required.
#[derive(Debug, Clone)]
pub struct AuthInterceptor {
    tokens: TokenCell,
}

impl AuthInterceptor {
    /// Creates an interceptor reading from the given token cell.
    #[must_use]
    pub fn new(tokens: TokenCell) -> Self {
        Self { tokens }
    }
}

impl Interceptor for AuthInterceptor {
    fn call(
        &mut self,
        mut request: tonic::Request<()>,
    ) -> Result<tonic::Request<()>, tonic::Status> {
        if let Some(bearer) = self.tokens.bearer() {
            match MetadataValue::try_from(bearer.as_str()) {
                Ok(value) => {
                    request.metadata_mut().insert(AUTHORIZATION_KEY, value);
                }
                Err(_) => {
                    return Err(tonic::Status::internal(
                        "stored access token is not valid metadata",
                    ));
                }
            }
        }

        Ok(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn token_cell_starts_empty() {
        let cell = TokenCell::new();
        assert!(!cell.is_set());
        assert!(cell.bearer().is_none());
    }

    #[test]
    fn token_cell_store_and_bearer() {
        let cell = TokenCell::new();
        cell.store("tok-123".to_owned());

        assert!(cell.is_set());
        assert_eq!(cell.bearer().as_deref(), Some("Bearer tok-123"));
    }

    #[test]
    fn token_cell_refresh_replaces_token() {
        let cell = TokenCell::new();
        cell.store("old".to_owned());
        cell.store("new".to_owned());

        assert_eq!(cell.bearer().as_deref(), Some("Bearer new"));
    }

    #[test]
    fn token_cell_clones_share_state() {
        let cell = TokenCell::new();
        let clone = cell.clone();

        cell.store("shared".to_owned());
        assert_eq!(clone.bearer().as_deref(), Some("Bearer shared"));

        clone.clear();
        assert!(!cell.is_set());
    }

    #[test]
    fn interceptor_skips_header_without_token() {
        let mut interceptor = AuthInterceptor::new(TokenCell::new());

        let request = tonic::Request::new(());
        let result = interceptor.call(request).expect("should succeed");

        assert!(result.metadata().get(AUTHORIZATION_KEY).is_none());
    }

    #[test]
    fn interceptor_attaches_bearer_token() {
        let cell = TokenCell::new();
        cell.store("tok-456".to_owned());
        let mut interceptor = AuthInterceptor::new(cell);

        let request = tonic::Request::new(());
        let result = interceptor.call(request).expect("should succeed");

        let value = result
            .metadata()
            .get(AUTHORIZATION_KEY)
            .expect("authorization header present");
        assert_eq!(value.to_str().expect("ascii header"), "Bearer tok-456");
    }

    #[test]
    fn interceptor_sees_refreshed_token() {
        let cell = TokenCell::new();
        cell.store("first".to_owned());
        let mut interceptor = AuthInterceptor::new(cell.clone());

        cell.store("second".to_owned());

        let result = interceptor.call(tonic::Request::new(())).expect("should succeed");
        let value = result.metadata().get(AUTHORIZATION_KEY).expect("header present");
        assert_eq!(value.to_str().expect("ascii header"), "Bearer second");
    }
}
