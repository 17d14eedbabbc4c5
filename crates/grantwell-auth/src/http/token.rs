//! OAuth 2.0 token endpoint handler.
//!
//! Serves `POST /v1/oauth/tokens`. The client is authenticated first, then the
//! request goes through the [`GrantDispatcher`].
//!
//! # Example
//!
//! ```text
//! POST /v1/oauth/tokens
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=refresh_token
//! &refresh_token=test_token
//! &scope=foo
//! ```

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use base64::Engine;
use tracing::{debug, error, info, warn};

use crate::error::AuthError;
use crate::oauth::dispatcher::GrantDispatcher;
use crate::oauth::token::{TokenError, TokenRequest, TokenResponse};
use crate::storage::ClientStorage;
use crate::types::Client;

/// Path the token endpoint is mounted at.
pub const TOKEN_PATH: &str = "/v1/oauth/tokens";

/// State required for the token endpoint.
#[derive(Clone)]
pub struct TokenState {
    /// Grant handlers keyed by grant type.
    dispatcher: Arc<GrantDispatcher>,
    /// Client storage for authenticating clients.
    client_storage: Arc<dyn ClientStorage>,
}

impl TokenState {
    /// Creates a new token state.
    pub fn new(dispatcher: Arc<GrantDispatcher>, client_storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            dispatcher,
            client_storage,
        }
    }
}

/// Builds a router exposing the token endpoint at [`TOKEN_PATH`].
pub fn token_router(state: TokenState) -> Router {
    Router::new()
        .route(TOKEN_PATH, post(token_handler))
        .with_state(state)
}

/// OAuth 2.0 token endpoint handler.
///
/// Handles POST requests with an `application/x-www-form-urlencoded` body.
///
/// # Client Authentication
///
/// Clients can authenticate using:
/// - HTTP Basic Auth header: `Authorization: Basic <base64(client_id:client_secret)>`
/// - Request body: `client_id` and `client_secret` parameters
/// - Public client: just the `client_id` parameter
pub async fn token_handler(
    State(state): State<TokenState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let Form(request) = match form {
        Ok(form) => form,
        Err(rejection) => {
            debug!(error = %rejection, "Malformed token request body");
            return token_error_response(AuthError::invalid_request(
                "Malformed token request body",
            ));
        }
    };

    debug!(
        grant_type = %request.grant_type,
        client_id = ?request.client_id,
        "Processing token request"
    );

    let client_auth = extract_client_auth(&headers, &request);

    let client = match authenticate_client(state.client_storage.as_ref(), client_auth).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error_code = e.oauth_error_code(), error = %e, "Client authentication failed");
            return token_error_response(e);
        }
    };

    match state.dispatcher.dispatch(&request, &client).await {
        Ok(response) => {
            info!(
                client_id = %client.client_id,
                grant_type = %request.grant_type,
                "Token issued successfully"
            );
            token_success_response(response)
        }
        Err(e) => {
            if e.is_server_error() {
                error!(
                    client_id = %client.client_id,
                    grant_type = %request.grant_type,
                    category = %e.category(),
                    error = %e,
                    "Token request failed"
                );
            } else {
                warn!(
                    client_id = %client.client_id,
                    grant_type = %request.grant_type,
                    error_code = e.oauth_error_code(),
                    error = %e,
                    "Token request rejected"
                );
            }
            token_error_response(e)
        }
    }
}

/// Client authentication credentials extracted from the request.
#[derive(Debug, PartialEq, Eq)]
enum ClientAuth {
    /// HTTP Basic authentication.
    Basic { client_id: String, client_secret: String },
    /// Client credentials in request body.
    Body { client_id: String, client_secret: String },
    /// Public client (no secret).
    Public { client_id: String },
    /// No client credentials provided.
    None,
}

/// Extract client authentication from headers and request.
fn extract_client_auth(headers: &HeaderMap, request: &TokenRequest) -> ClientAuth {
    // HTTP Basic takes precedence over body credentials.
    if let Some((client_id, client_secret)) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| {
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .ok()
        })
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|creds| {
            creds
                .split_once(':')
                .map(|(id, secret)| (id.to_string(), secret.to_string()))
        })
    {
        return ClientAuth::Basic {
            client_id,
            client_secret,
        };
    }

    match (request.client_id.as_ref(), request.client_secret.as_ref()) {
        (Some(client_id), Some(client_secret)) => ClientAuth::Body {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        },
        (Some(client_id), None) => ClientAuth::Public {
            client_id: client_id.clone(),
        },
        _ => ClientAuth::None,
    }
}

/// Authenticate the client based on provided credentials.
async fn authenticate_client(
    client_storage: &dyn ClientStorage,
    auth: ClientAuth,
) -> Result<Client, AuthError> {
    let (client_id, secret) = match auth {
        ClientAuth::Basic {
            client_id,
            client_secret,
        }
        | ClientAuth::Body {
            client_id,
            client_secret,
        } => (client_id, Some(client_secret)),
        ClientAuth::Public { client_id } => (client_id, None),
        ClientAuth::None => {
            return Err(AuthError::invalid_client("No client credentials provided"));
        }
    };

    let client = client_storage
        .find_by_client_id(&client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

    if !client.active {
        return Err(AuthError::invalid_client("Client is inactive"));
    }

    if client.confidential {
        let provided_secret = secret.ok_or_else(|| {
            AuthError::invalid_client("Client secret required for confidential client")
        })?;

        if !client_storage
            .verify_secret(&client_id, &provided_secret)
            .await?
        {
            return Err(AuthError::invalid_client("Invalid client secret"));
        }
    }

    Ok(client)
}

/// Headers every token endpoint response carries.
fn no_store_headers() -> [(header::HeaderName, HeaderValue); 2] {
    [
        (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
    ]
}

/// Build a successful token response.
fn token_success_response(response: TokenResponse) -> Response {
    (StatusCode::OK, no_store_headers(), Json(response)).into_response()
}

/// Build an error response for the token endpoint.
fn token_error_response(error: AuthError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = TokenError::from(&error);

    let mut response = (status, no_store_headers(), Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"token\""),
        );
    }
    response
}
