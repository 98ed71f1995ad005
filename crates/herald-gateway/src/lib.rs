// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP ingress for the Herald relay.
//!
//! `POST /api/send` turns form submissions into inline relay tasks on the
//! shared [`RelayEngine`]; `GET /api/health` reports pool connectivity and
//! queue depth.

pub mod auth;
pub mod fetch;
pub mod handlers;
pub mod server;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use herald_config::model::GatewayConfig;
use herald_core::types::{AdapterType, HealthStatus};
use herald_core::{HeraldError, PluginAdapter};
use herald_dispatch::RelayEngine;

pub use crate::auth::AuthConfig;
pub use crate::fetch::HttpPhotoFetcher;
pub use crate::handlers::{PhotoInput, PhotoSource};
pub use crate::server::{build_router, start_server, GatewayState, MetricsRender, ServerConfig};

/// The HTTP ingress adapter. Runs the axum server as a background task.
pub struct HttpGateway {
    config: ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
    server_handle: Mutex<Option<JoinHandle<()>>>,
}

impl HttpGateway {
    pub fn new(config: ServerConfig, state: GatewayState, cancel: CancellationToken) -> Self {
        Self {
            config,
            state,
            cancel,
            server_handle: Mutex::new(None),
        }
    }

    /// Builds the gateway from `[gateway]`. The server stops producing when
    /// the engine begins shutting down.
    pub fn from_config(
        config: &GatewayConfig,
        engine: Arc<RelayEngine>,
        prometheus_render: Option<MetricsRender>,
    ) -> Result<Self, HeraldError> {
        let fetcher = HttpPhotoFetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
        let auth = AuthConfig {
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
        };
        if !auth.is_enabled() {
            tracing::warn!("gateway bearer token not set, /api/send is unauthenticated");
        }
        let cancel = engine.producer_token();
        let state = GatewayState {
            engine,
            fetcher: Arc::new(fetcher),
            auth,
            prometheus_render,
        };
        Ok(Self::new(ServerConfig::from(config), state, cancel))
    }

    /// Starts serving in the background.
    pub fn spawn(&self) {
        let config = self.config.clone();
        let state = self.state.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = start_server(&config, state, cancel).await {
                tracing::error!(error = %e, "gateway server failed");
            }
        });
        *self
            .server_handle
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(handle);
    }

    pub fn is_running(&self) -> bool {
        self.server_handle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

#[async_trait]
impl PluginAdapter for HttpGateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ingress
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        if self.is_running() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("gateway server is not running".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.cancel.cancel();
        let handle = self
            .server_handle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| HeraldError::Internal(format!(
                "gateway task ended abnormally: {e}"
            )))?;
        }
        Ok(())
    }
}
