use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

use grantwell_auth::prelude::*;
use grantwell_auth::TOKEN_PATH;

struct TestApp {
    router: Router,
    store: Arc<InMemoryCredentialStore>,
}

fn test_client(client_id: &str, grant_types: Vec<GrantType>) -> Client {
    Client {
        client_id: client_id.to_string(),
        client_secret: Some(Client::hash_secret("test_secret").unwrap()),
        name: "Test Client".to_string(),
        grant_types,
        scopes: vec![],
        confidential: true,
        active: true,
        access_token_lifetime: None,
    }
}

async fn seed_refresh_token(store: &InMemoryCredentialStore, expires_in: Duration) {
    let now = OffsetDateTime::now_utc();
    store
        .create_refresh_token(&RefreshToken {
            token: "test_token".to_string(),
            client_id: "test_client_1".to_string(),
            user_id: Some("test@user".to_string()),
            scope: Scope::parse("foo bar"),
            created_at: now,
            expires_at: now + expires_in,
        })
        .await
        .unwrap();
}

async fn start_app(config: RefreshGrantConfig, expires_in: Duration) -> TestApp {
    let store = Arc::new(InMemoryCredentialStore::new());
    seed_refresh_token(&store, expires_in).await;

    let clients = InMemoryClientStorage::new([
        test_client("test_client_1", vec![GrantType::RefreshToken]),
        test_client("test_client_2", vec![GrantType::RefreshToken]),
        test_client("code_only", vec![GrantType::AuthorizationCode]),
    ]);

    let dispatcher = GrantDispatcher::new()
        .register(Arc::new(RefreshTokenGrant::new(store.clone(), config)));
    let state = TokenState::new(Arc::new(dispatcher), Arc::new(clients));

    TestApp {
        router: token_router(state),
        store,
    }
}

fn basic(client_id: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{client_id}:test_secret"));
    format!("Basic {encoded}")
}

async fn post_token(app: &TestApp, authorization: Option<String>, body: &str) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(TOKEN_PATH)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(authorization) = authorization {
        request = request.header(header::AUTHORIZATION, authorization);
    }

    let response = app
        .router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn refresh_with_greater_scope_is_rejected() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(
        &app,
        Some(basic("test_client_1")),
        "grant_type=refresh_token&refresh_token=test_token&scope=foo%20bar%20qux",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Requested scope cannot be greater"}));
    assert_eq!(app.store.count_access_tokens().await.unwrap(), 0);
}

#[tokio::test]
async fn refresh_with_same_scope_issues_access_token() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(
        &app,
        Some(basic("test_client_1")),
        "grant_type=refresh_token&refresh_token=test_token&scope=foo%20bar",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "foo bar");
    assert_eq!(body["refresh_token"], "test_token");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(body["token_type"], "Bearer");

    let access_token = body["access_token"].as_str().unwrap();
    let stored = app.store.find_access_token(access_token).await.unwrap().unwrap();
    assert_eq!(body["id"], stored.id);
    assert_eq!(stored.client_id, "test_client_1");
}

#[tokio::test]
async fn refresh_with_body_credentials() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(
        &app,
        None,
        "grant_type=refresh_token&refresh_token=test_token&client_id=test_client_1&client_secret=test_secret",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "foo bar");
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(-1)).await;

    let (status, body) = post_token(
        &app,
        Some(basic("test_client_1")),
        "grant_type=refresh_token&refresh_token=test_token",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Refresh token expired"}));
    assert_eq!(app.store.count_access_tokens().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_refresh_token_is_rejected() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(
        &app,
        Some(basic("test_client_1")),
        "grant_type=refresh_token&refresh_token=bogus",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Refresh token not found"}));
}

#[tokio::test]
async fn refresh_token_of_other_client_is_rejected() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(
        &app,
        Some(basic("test_client_2")),
        "grant_type=refresh_token&refresh_token=test_token",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Refresh token not found"}));
}

#[tokio::test]
async fn rotation_replaces_refresh_token() {
    let config = RefreshGrantConfig::default().with_rotate_refresh_tokens(true);
    let app = start_app(config, Duration::seconds(10)).await;

    let (status, body) = post_token(
        &app,
        Some(basic("test_client_1")),
        "grant_type=refresh_token&refresh_token=test_token&scope=foo",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "foo");

    let successor = body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(successor, "test_token");

    let (status, _) = post_token(
        &app,
        Some(basic("test_client_1")),
        "grant_type=refresh_token&refresh_token=test_token",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The successor still carries the full original scope.
    let (status, body) = post_token(
        &app,
        Some(basic("test_client_1")),
        &format!("grant_type=refresh_token&refresh_token={successor}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "foo bar");
}

#[tokio::test]
async fn unsupported_grant_type() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(&app, Some(basic("test_client_1")), "grant_type=password").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Grant type 'password' is not supported"}));
}

#[tokio::test]
async fn client_not_allowed_refresh_grant() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(
        &app,
        Some(basic("code_only")),
        "grant_type=refresh_token&refresh_token=test_token",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Client not authorized for refresh_token grant"}));
}

#[tokio::test]
async fn missing_client_credentials() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(&app, None, "grant_type=refresh_token&refresh_token=test_token").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "No client credentials provided"}));
}

#[tokio::test]
async fn wrong_client_secret() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;
    let encoded = base64::engine::general_purpose::STANDARD.encode("test_client_1:wrong");

    let (status, body) = post_token(
        &app,
        Some(format!("Basic {encoded}")),
        "grant_type=refresh_token&refresh_token=test_token",
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Invalid client secret"}));
}

#[tokio::test]
async fn missing_refresh_token_parameter() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(&app, Some(basic("test_client_1")), "grant_type=refresh_token").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing refresh_token parameter"}));
}

#[tokio::test]
async fn missing_grant_type_parameter() {
    let app = start_app(RefreshGrantConfig::default(), Duration::seconds(10)).await;

    let (status, body) = post_token(&app, Some(basic("test_client_1")), "refresh_token=test_token").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing grant_type parameter"}));
    assert_eq!(app.store.count_access_tokens().await.unwrap(), 0);
}
