//! Refresh token grant (RFC 6749 Section 6).
//!
//! One call walks the request through a fixed sequence of checks and ends in
//! either an issued credential set or a rejection:
//!
//! ```text
//! lookup -> expiry -> scope -> issue
//! ```
//!
//! Every rejection happens before anything is written, so a failed request
//! leaves the credential store untouched.
//!
//! # Rotation
//!
//! With rotation disabled (the default) the presented refresh token stays
//! valid until it expires and is returned unchanged. Concurrent requests with
//! the same token may all succeed, each getting its own access token.
//!
//! With rotation enabled the presented token is consumed and a successor is
//! issued in the same store operation. Of several concurrent requests with the
//! same token only one succeeds; the rest fail with `invalid_grant`.

use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::grant::{GrantHandler, GrantRequest};
use crate::oauth::token::TokenResponse;
use crate::scope::Scope;
use crate::storage::CredentialStore;
use crate::token::TokenFactory;
use crate::types::{Client, GrantType, NewAccessToken, RefreshToken};

/// Settings for the refresh token grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrantConfig {
    /// Default access token lifetime.
    /// Can be overridden per-client.
    pub access_token_lifetime: Duration,

    /// Lifetime of successor refresh tokens (rotation only).
    pub refresh_token_lifetime: Duration,

    /// Whether to rotate refresh tokens on use.
    pub rotate_refresh_tokens: bool,
}

impl Default for RefreshGrantConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::hours(1),
            refresh_token_lifetime: Duration::days(14),
            rotate_refresh_tokens: false,
        }
    }
}

impl RefreshGrantConfig {
    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Sets the successor refresh token lifetime.
    #[must_use]
    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    /// Sets whether to rotate refresh tokens on use.
    #[must_use]
    pub fn with_rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }
}

/// Handler for `grant_type=refresh_token`.
pub struct RefreshTokenGrant {
    credential_store: Arc<dyn CredentialStore>,
    token_factory: TokenFactory,
    config: RefreshGrantConfig,
}

impl RefreshTokenGrant {
    /// Creates a new handler over the given credential store.
    #[must_use]
    pub fn new(credential_store: Arc<dyn CredentialStore>, config: RefreshGrantConfig) -> Self {
        Self {
            credential_store,
            token_factory: TokenFactory::new(),
            config,
        }
    }

    /// Gets the handler configuration.
    #[must_use]
    pub fn config(&self) -> &RefreshGrantConfig {
        &self.config
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// - `UnauthorizedClient` if the client may not use this grant
    /// - `InvalidRequest` if the `refresh_token` parameter is missing
    /// - `InvalidGrant` if the token is unknown, bound to another client,
    ///   expired, or was consumed by a concurrent rotation
    /// - `InvalidScope` if the requested scope exceeds the granted one or
    ///   holds a scope the client is not registered for
    /// - `Configuration` if a token lifetime overflows the expiry time
    /// - `Storage` if the credential store fails
    pub async fn refresh(&self, request: &GrantRequest, client: &Client) -> AuthResult<TokenResponse> {
        self.refresh_at(request, client, OffsetDateTime::now_utc())
            .await
    }

    /// Same as [`refresh`](Self::refresh) with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`refresh`](Self::refresh).
    pub async fn refresh_at(
        &self,
        request: &GrantRequest,
        client: &Client,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        if !client.is_grant_type_allowed(GrantType::RefreshToken) {
            return Err(AuthError::unauthorized_client(
                "Client not authorized for refresh_token grant",
            ));
        }

        let presented = request
            .refresh_token
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing refresh_token parameter"))?;

        let stored = self.lookup(presented, client).await?;

        if stored.is_expired_at(now) {
            debug!(client_id = %client.client_id, "Refresh token expired");
            return Err(AuthError::invalid_grant("Refresh token expired"));
        }

        let scope = determine_scope(request.scope.as_ref(), &stored)?;

        if let Some(denied) = scope.iter().find(|token| !client.is_scope_allowed(token)) {
            debug!(client_id = %client.client_id, scope = %denied, "Scope not registered for client");
            return Err(AuthError::invalid_scope(
                "Requested scope is not allowed for this client",
            ));
        }

        let lifetime = client
            .access_token_lifetime
            .map(Duration::seconds)
            .unwrap_or(self.config.access_token_lifetime);

        let response = if self.config.rotate_refresh_tokens {
            self.issue_rotated(&stored, scope, lifetime, now).await?
        } else {
            self.issue_reusing(&stored, scope, lifetime, now).await?
        };

        info!(
            client_id = %client.client_id,
            access_token_id = response.id,
            scope = %response.scope,
            rotated = self.config.rotate_refresh_tokens,
            "Access token issued from refresh token"
        );

        Ok(response)
    }

    /// Resolves the presented value to a refresh token issued to `client`.
    async fn lookup(&self, presented: &str, client: &Client) -> AuthResult<RefreshToken> {
        let stored = self
            .credential_store
            .find_refresh_token(presented)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Refresh token not found"))?;

        // Indistinguishable from an unknown token to the caller.
        if !stored.is_issued_to(&client.client_id) {
            warn!(
                client_id = %client.client_id,
                owner_client_id = %stored.client_id,
                "Refresh token presented by a different client"
            );
            return Err(AuthError::invalid_grant("Refresh token not found"));
        }

        Ok(stored)
    }

    async fn issue_reusing(
        &self,
        stored: &RefreshToken,
        scope: Scope,
        lifetime: Duration,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        let access = self.new_access_token(stored, scope, lifetime, now, &stored.token)?;
        let access = self.credential_store.create_access_token(access).await?;

        Ok(build_response(access.id, access.token, lifetime, access.scope)
            .with_refresh_token(stored.token.clone()))
    }

    async fn issue_rotated(
        &self,
        stored: &RefreshToken,
        scope: Scope,
        lifetime: Duration,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        let issued = self
            .token_factory
            .issue_at(now, self.config.refresh_token_lifetime)?;

        // The successor keeps the full original grant; only the access token
        // is narrowed.
        let successor = RefreshToken {
            token: issued.value,
            client_id: stored.client_id.clone(),
            user_id: stored.user_id.clone(),
            scope: stored.scope.clone(),
            created_at: now,
            expires_at: issued.expires_at,
        };

        let access = self.new_access_token(stored, scope, lifetime, now, &successor.token)?;
        let access = self
            .credential_store
            .rotate_refresh_token(&stored.token, &successor, access)
            .await?;

        Ok(build_response(access.id, access.token, lifetime, access.scope)
            .with_refresh_token(successor.token))
    }

    fn new_access_token(
        &self,
        stored: &RefreshToken,
        scope: Scope,
        lifetime: Duration,
        now: OffsetDateTime,
        refresh_token: &str,
    ) -> AuthResult<NewAccessToken> {
        let issued = self.token_factory.issue_at(now, lifetime)?;
        Ok(NewAccessToken {
            token: issued.value,
            client_id: stored.client_id.clone(),
            user_id: stored.user_id.clone(),
            scope,
            refresh_token: Some(refresh_token.to_string()),
            created_at: now,
            expires_at: issued.expires_at,
        })
    }
}

#[async_trait]
impl GrantHandler for RefreshTokenGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::RefreshToken
    }

    async fn handle(&self, request: &GrantRequest, client: &Client) -> AuthResult<TokenResponse> {
        self.refresh(request, client).await
    }
}

/// Determines the scope of the new access token.
///
/// The scope can be narrowed but not expanded. No requested scope means the
/// full scope of the refresh token.
fn determine_scope(requested: Option<&Scope>, stored: &RefreshToken) -> AuthResult<Scope> {
    match requested {
        Some(requested) if !requested.is_empty() => {
            if !requested.is_subset_of(&stored.scope) {
                return Err(AuthError::invalid_scope(
                    "Requested scope cannot be greater",
                ));
            }
            Ok(requested.clone())
        }
        _ => Ok(stored.scope.clone()),
    }
}

fn build_response(id: i64, access_token: String, lifetime: Duration, scope: Scope) -> TokenResponse {
    let expires_in = u64::try_from(lifetime.whole_seconds()).unwrap_or(0);
    TokenResponse::new(id, access_token, expires_in, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryCredentialStore;
    use crate::types::AccessToken;

    fn create_test_client(client_id: &str) -> Client {
        Client {
            client_id: client_id.to_string(),
            client_secret: Some(Client::hash_secret("test_secret").unwrap()),
            name: "Test Client".to_string(),
            grant_types: vec![GrantType::RefreshToken],
            scopes: vec![],
            confidential: true,
            active: true,
            access_token_lifetime: None,
        }
    }

    fn create_refresh_token(expires_in: Duration) -> RefreshToken {
        let now = OffsetDateTime::now_utc();
        RefreshToken {
            token: "test_token".to_string(),
            client_id: "test_client_1".to_string(),
            user_id: Some("test@user".to_string()),
            scope: Scope::parse("foo bar"),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    fn request(scope: Option<&str>) -> GrantRequest {
        GrantRequest {
            grant_type: GrantType::RefreshToken,
            refresh_token: Some("test_token".to_string()),
            scope: scope.map(Scope::parse),
        }
    }

    async fn create_test_grant(
        config: RefreshGrantConfig,
    ) -> (RefreshTokenGrant, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .create_refresh_token(&create_refresh_token(Duration::seconds(10)))
            .await
            .unwrap();
        (RefreshTokenGrant::new(store.clone(), config), store)
    }

    /// Credential store whose writes always fail.
    struct FailingStore {
        inner: InMemoryCredentialStore,
    }

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<RefreshToken>> {
            self.inner.find_refresh_token(token).await
        }

        async fn create_refresh_token(&self, token: &RefreshToken) -> AuthResult<()> {
            self.inner.create_refresh_token(token).await
        }

        async fn create_access_token(&self, _token: NewAccessToken) -> AuthResult<AccessToken> {
            Err(AuthError::storage("disk full"))
        }

        async fn rotate_refresh_token(
            &self,
            _consumed: &str,
            _successor: &RefreshToken,
            _access: NewAccessToken,
        ) -> AuthResult<AccessToken> {
            Err(AuthError::storage("disk full"))
        }

        async fn find_access_token(&self, token: &str) -> AuthResult<Option<AccessToken>> {
            self.inner.find_access_token(token).await
        }

        async fn count_access_tokens(&self) -> AuthResult<u64> {
            self.inner.count_access_tokens().await
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            self.inner.cleanup_expired().await
        }
    }

    #[tokio::test]
    async fn test_refresh_with_equal_scope() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;
        let client = create_test_client("test_client_1");

        let response = grant.refresh(&request(Some("foo bar")), &client).await.unwrap();

        assert_eq!(response.scope.to_string(), "foo bar");
        assert_eq!(response.refresh_token.as_deref(), Some("test_token"));
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.token_type, "Bearer");

        let stored = store
            .find_access_token(&response.access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, response.id);
        assert_eq!(stored.client_id, "test_client_1");
        assert_eq!(stored.user_id.as_deref(), Some("test@user"));
        assert_eq!(stored.refresh_token.as_deref(), Some("test_token"));
    }

    #[tokio::test]
    async fn test_refresh_without_scope_keeps_original() {
        let (grant, _store) = create_test_grant(RefreshGrantConfig::default()).await;
        let client = create_test_client("test_client_1");

        let response = grant.refresh(&request(None), &client).await.unwrap();
        assert_eq!(response.scope, Scope::parse("foo bar"));

        let response = grant.refresh(&request(Some("")), &client).await.unwrap();
        assert_eq!(response.scope, Scope::parse("foo bar"));
    }

    #[tokio::test]
    async fn test_refresh_narrows_scope() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;
        let client = create_test_client("test_client_1");

        let response = grant.refresh(&request(Some("foo")), &client).await.unwrap();
        assert_eq!(response.scope.to_string(), "foo");

        // The refresh token itself keeps its full scope.
        let stored = store.find_refresh_token("test_token").await.unwrap().unwrap();
        assert_eq!(stored.scope, Scope::parse("foo bar"));
    }

    #[tokio::test]
    async fn test_refresh_scope_cannot_be_greater() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;
        let client = create_test_client("test_client_1");

        let err = grant
            .refresh(&request(Some("foo bar qux")), &client)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidScope { .. }));
        assert_eq!(err.message(), "Requested scope cannot be greater");
        assert_eq!(store.count_access_tokens().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .create_refresh_token(&create_refresh_token(Duration::seconds(-1)))
            .await
            .unwrap();
        let grant = RefreshTokenGrant::new(store.clone(), RefreshGrantConfig::default());

        let err = grant
            .refresh(&request(None), &create_test_client("test_client_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert_eq!(err.message(), "Refresh token expired");
        assert_eq!(store.count_access_tokens().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_expires_at_exact_instant() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;
        let stored = store.find_refresh_token("test_token").await.unwrap().unwrap();
        let client = create_test_client("test_client_1");

        let err = grant
            .refresh_at(&request(None), &client, stored.expires_at)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));

        let ok = grant
            .refresh_at(&request(None), &client, stored.expires_at - Duration::seconds(1))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let (grant, _store) = create_test_grant(RefreshGrantConfig::default()).await;
        let mut req = request(None);
        req.refresh_token = Some("bogus".to_string());

        let err = grant
            .refresh(&req, &create_test_client("test_client_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert_eq!(err.message(), "Refresh token not found");
    }

    #[tokio::test]
    async fn test_refresh_token_of_other_client() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;

        let err = grant
            .refresh(&request(None), &create_test_client("test_client_2"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert_eq!(err.message(), "Refresh token not found");
        assert_eq!(store.count_access_tokens().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_missing_parameter() {
        let (grant, _store) = create_test_grant(RefreshGrantConfig::default()).await;
        let mut req = request(None);
        req.refresh_token = None;

        let err = grant
            .refresh(&req, &create_test_client("test_client_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_refresh_client_not_allowed() {
        let (grant, _store) = create_test_grant(RefreshGrantConfig::default()).await;
        let mut client = create_test_client("test_client_1");
        client.grant_types = vec![GrantType::AuthorizationCode];

        let err = grant.refresh(&request(None), &client).await.unwrap_err();
        assert!(matches!(err, AuthError::UnauthorizedClient { .. }));
    }

    #[tokio::test]
    async fn test_refresh_client_lifetime_override() {
        let (grant, _store) = create_test_grant(RefreshGrantConfig::default()).await;
        let mut client = create_test_client("test_client_1");
        client.access_token_lifetime = Some(120);

        let response = grant.refresh(&request(None), &client).await.unwrap();
        assert_eq!(response.expires_in, 120);
    }

    #[tokio::test]
    async fn test_refresh_store_failure_is_server_error() {
        let inner = InMemoryCredentialStore::new();
        inner
            .create_refresh_token(&create_refresh_token(Duration::seconds(10)))
            .await
            .unwrap();
        let grant = RefreshTokenGrant::new(
            Arc::new(FailingStore { inner }),
            RefreshGrantConfig::default(),
        );

        let err = grant
            .refresh(&request(None), &create_test_client("test_client_1"))
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_repeated_refresh_without_rotation() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;
        let client = create_test_client("test_client_1");

        let first = grant.refresh(&request(None), &client).await.unwrap();
        let second = grant.refresh(&request(None), &client).await.unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.id, second.id);
        assert_eq!(first.refresh_token, second.refresh_token);
        assert_eq!(store.count_access_tokens().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rotation_issues_successor() {
        let config = RefreshGrantConfig::default().with_rotate_refresh_tokens(true);
        let (grant, store) = create_test_grant(config).await;
        let client = create_test_client("test_client_1");

        let response = grant.refresh(&request(Some("foo")), &client).await.unwrap();
        let successor = response.refresh_token.clone().unwrap();
        assert_ne!(successor, "test_token");

        assert!(store.find_refresh_token("test_token").await.unwrap().is_none());
        let stored = store.find_refresh_token(&successor).await.unwrap().unwrap();
        assert_eq!(stored.scope, Scope::parse("foo bar"));
        assert_eq!(stored.client_id, "test_client_1");

        let access = store
            .find_access_token(&response.access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(access.refresh_token.as_deref(), Some(successor.as_str()));

        // The consumed token cannot be exchanged again.
        let err = grant.refresh(&request(None), &client).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }

    #[tokio::test]
    async fn test_rotation_concurrent_requests_issue_once() {
        let config = RefreshGrantConfig::default().with_rotate_refresh_tokens(true);
        let (grant, store) = create_test_grant(config).await;
        let grant = Arc::new(grant);
        let client = create_test_client("test_client_1");

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let grant = grant.clone();
            let client = client.clone();
            tasks.push(tokio::spawn(async move {
                grant.refresh(&request(None), &client).await
            }));
        }

        let mut issued = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => issued += 1,
                Err(err) => assert!(matches!(err, AuthError::InvalidGrant { .. })),
            }
        }

        assert_eq!(issued, 1);
        assert_eq!(store.count_access_tokens().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rotation_rejection_keeps_presented_token() {
        let config = RefreshGrantConfig::default().with_rotate_refresh_tokens(true);
        let (grant, store) = create_test_grant(config).await;
        let client = create_test_client("test_client_1");

        let err = grant
            .refresh(&request(Some("foo bar qux")), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidScope { .. }));

        let stored = store.find_refresh_token("test_token").await.unwrap().unwrap();
        assert_eq!(stored.scope, Scope::parse("foo bar"));
        assert_eq!(store.count_access_tokens().await.unwrap(), 0);

        // Still exchangeable after the rejection.
        let response = grant.refresh(&request(Some("foo")), &client).await.unwrap();
        assert_ne!(response.refresh_token.as_deref(), Some("test_token"));
    }

    #[tokio::test]
    async fn test_rotation_expired_token_is_not_consumed() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .create_refresh_token(&create_refresh_token(Duration::seconds(-1)))
            .await
            .unwrap();
        let config = RefreshGrantConfig::default().with_rotate_refresh_tokens(true);
        let grant = RefreshTokenGrant::new(store.clone(), config);

        let err = grant
            .refresh(&request(None), &create_test_client("test_client_1"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Refresh token expired");

        assert!(store.find_refresh_token("test_token").await.unwrap().is_some());
        assert_eq!(store.count_access_tokens().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_scope_outside_client_registration() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;
        let mut client = create_test_client("test_client_1");
        client.scopes = vec!["foo".to_string()];

        let response = grant.refresh(&request(Some("foo")), &client).await.unwrap();
        assert_eq!(response.scope.to_string(), "foo");

        let err = grant.refresh(&request(None), &client).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidScope { .. }));
        assert_eq!(err.message(), "Requested scope is not allowed for this client");
        assert_eq!(store.count_access_tokens().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refresh_lifetime_overflow_is_server_error() {
        let (grant, store) = create_test_grant(RefreshGrantConfig::default()).await;
        let mut client = create_test_client("test_client_1");
        client.access_token_lifetime = Some(i64::MAX);

        let err = grant.refresh(&request(None), &client).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
        assert_eq!(err.status_code(), 500);
        assert_eq!(store.count_access_tokens().await.unwrap(), 0);

        let config = RefreshGrantConfig::default()
            .with_rotate_refresh_tokens(true)
            .with_refresh_token_lifetime(Duration::MAX);
        let (grant, store) = create_test_grant(config).await;
        let err = grant
            .refresh(&request(None), &create_test_client("test_client_1"))
            .await
            .unwrap_err();
        assert!(err.is_server_error());
        assert!(store.find_refresh_token("test_token").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_handler_grant_type() {
        let (grant, _store) = create_test_grant(RefreshGrantConfig::default()).await;
        assert_eq!(grant.grant_type(), GrantType::RefreshToken);
    }
}
