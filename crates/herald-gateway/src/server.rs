// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use herald_config::model::GatewayConfig;
use herald_core::{HeraldError, PhotoFetcher};
use herald_dispatch::RelayEngine;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Renders the Prometheus exposition text.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Engine receiving submitted tasks.
    pub engine: Arc<RelayEngine>,
    /// Resolves `photo=<url>` submissions.
    pub fetcher: Arc<dyn PhotoFetcher>,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<MetricsRender>,
}

/// Listener settings taken from `[gateway]`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Request body cap, uploads included.
    pub max_body_bytes: usize,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Builds the gateway routes:
/// - POST /api/send (bearer auth when configured)
/// - GET /api/health
/// - GET /metrics
pub fn build_router(state: GatewayState, max_body_bytes: usize) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/send", post(handlers::post_send))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `shutdown` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), HeraldError> {
    let app = build_router(state, config.max_body_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HeraldError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| HeraldError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
