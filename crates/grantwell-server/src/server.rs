use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use grantwell_auth::oauth::{GrantDispatcher, RefreshTokenGrant};
use grantwell_auth::storage::{CredentialStore, InMemoryClientStorage, InMemoryCredentialStore};
use grantwell_auth::types::GrantType;
use grantwell_auth::{TokenState, token_router};
use grantwell_auth_postgres::PostgresAuthStorage;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, StorageBackend};

pub struct GrantwellServer {
    addr: SocketAddr,
    app: Router,
    credential_store: Arc<dyn CredentialStore>,
    cleanup_interval: Option<Duration>,
}

/// Opens the configured credential store.
pub async fn build_credential_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory credential store; issued tokens are lost on restart");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
        StorageBackend::Postgres => {
            let pg = cfg
                .storage
                .postgres
                .as_ref()
                .context("storage.postgres is not configured")?;
            let storage = PostgresAuthStorage::connect_with(&pg.url, pg.pool_size)
                .await
                .context("failed to connect to PostgreSQL")?;
            storage
                .ensure_schema()
                .await
                .context("failed to create credential tables")?;
            tracing::info!(pool_size = pg.pool_size, "PostgreSQL credential store ready");
            Ok(Arc::new(storage.credential_store()))
        }
    }
}

/// Registers a handler for every enabled grant type that has one.
pub fn build_dispatcher(
    cfg: &AppConfig,
    credential_store: Arc<dyn CredentialStore>,
) -> anyhow::Result<GrantDispatcher> {
    let mut dispatcher = GrantDispatcher::new();
    for grant_type in cfg.auth.oauth.enabled_grant_types()? {
        match grant_type {
            GrantType::RefreshToken => {
                let config = cfg.auth.oauth.refresh_grant_config()?;
                tracing::info!(
                    rotate_refresh_tokens = config.rotate_refresh_tokens,
                    access_token_lifetime_secs = config.access_token_lifetime.whole_seconds(),
                    "Refresh token grant enabled"
                );
                dispatcher =
                    dispatcher.register(Arc::new(RefreshTokenGrant::new(credential_store.clone(), config)));
            }
            other => {
                tracing::warn!(grant_type = %other, "Grant type enabled but not served; ignoring");
            }
        }
    }
    Ok(dispatcher)
}

pub fn build_app(cfg: &AppConfig, credential_store: Arc<dyn CredentialStore>) -> anyhow::Result<Router> {
    let dispatcher = build_dispatcher(cfg, credential_store)?;
    let clients = cfg
        .clients
        .iter()
        .map(|c| c.to_client())
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::msg)?;
    let clients = InMemoryClientStorage::new(clients);
    tracing::info!(clients = clients.len(), "Client registry loaded");

    let state = TokenState::new(Arc::new(dispatcher), Arc::new(clients));

    Ok(token_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes)))
}

/// Periodically purges expired refresh tokens.
pub fn spawn_cleanup(credential_store: Arc<dyn CredentialStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match credential_store.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Expired refresh tokens purged"),
                Err(e) => tracing::warn!(error = %e, "Refresh token cleanup failed"),
            }
        }
    })
}

#[derive(Default)]
pub struct ServerBuilder {
    config: AppConfig,
    credential_store: Option<Arc<dyn CredentialStore>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Uses `store` instead of opening the configured backend.
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    pub async fn build(self) -> anyhow::Result<GrantwellServer> {
        let credential_store = match self.credential_store {
            Some(store) => store,
            None => build_credential_store(&self.config).await?,
        };
        let app = build_app(&self.config, credential_store.clone())?;

        Ok(GrantwellServer {
            addr: self.config.addr(),
            app,
            credential_store,
            cleanup_interval: self.config.storage.cleanup_interval,
        })
    }
}

impl GrantwellServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let cleanup = self
            .cleanup_interval
            .filter(|interval| !interval.is_zero())
            .map(|interval| spawn_cleanup(self.credential_store.clone(), interval));

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(cleanup) = cleanup {
            cleanup.abort();
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
