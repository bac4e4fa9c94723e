//! HTTP 边缘层：路由、鉴权、请求校验与 NDJSON 流式响应。
//!
//! # HTTP Edge
//!
//! | Route | Auth | Response |
//! |-------|------|----------|
//! | `GET /` | none | fixed health body |
//! | `POST /api/chat` | `X-API-Key` | `application/x-ndjson` frame stream |
//!
//! Pre-stream failures (credential, empty message, bad body) are HTTP errors
//! with a `{"detail": ...}` body. Once the `200` is sent, failures are
//! reported in-band by the relay.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::auth::ApiKeyVerifier;
use crate::config::GatewayConfig;
use crate::transport::{GenerationBackend, UpstreamClient};
use crate::Result;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared, read-only state for all handlers.
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub verifier: ApiKeyVerifier,
    pub backend: Arc<dyn GenerationBackend>,
}

impl AppState {
    /// State backed by the real upstream client.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let backend = Arc::new(UpstreamClient::new(&config)?);
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: GatewayConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        let verifier = ApiKeyVerifier::new(config.api_key.clone());
        Self {
            config: Arc::new(config),
            verifier,
            backend,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` resolves.
///
/// In-flight relays are allowed to finish after shutdown starts.
pub async fn serve<F>(config: GatewayConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.listen_addr();
    let upstream = config.generate_url();
    let model = config.model.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        listen = %listener.local_addr()?,
        upstream = %upstream,
        model = %model,
        "chat-relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("chat-relay shut down");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install ctrl-c handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
