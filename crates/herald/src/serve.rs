// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald serve`: wires accounts, the relay engine and the ingress
//! adapters together, then waits for a shutdown signal.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use herald_config::HeraldConfig;
use herald_core::{AccountClient, HeraldError, PluginAdapter};
use herald_dispatch::{AccountPool, EngineSettings, IngressSettings, RelayEngine};
use herald_gateway::{HttpGateway, MetricsRender};
use herald_telegram::{spawn_listener, TelegramAccount};

use crate::shutdown;

/// Builds one Telegram client per configured account.
pub fn build_accounts(config: &HeraldConfig) -> Result<Vec<Arc<TelegramAccount>>, HeraldError> {
    config
        .resolved_accounts()
        .iter()
        .enumerate()
        .map(|(index, account)| TelegramAccount::new(account, index).map(Arc::new))
        .collect()
}

/// Runs the relay until SIGINT/SIGTERM, then drains and stops.
pub async fn run_serve(config: HeraldConfig) -> Result<(), HeraldError> {
    init_tracing(&config.log.level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting herald serve");

    // Install the recorder before anything records.
    #[cfg(feature = "prometheus")]
    let prometheus_adapter = if config.prometheus.enabled {
        match herald_prometheus::PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(adapter)
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    #[cfg(feature = "prometheus")]
    let prometheus_render: Option<MetricsRender> = prometheus_adapter.as_ref().map(|adapter| {
        let handle = adapter.handle().clone();
        Arc::new(move || handle.render()) as MetricsRender
    });
    #[cfg(not(feature = "prometheus"))]
    let prometheus_render: Option<MetricsRender> = None;

    let accounts = build_accounts(&config)?;
    let pool = AccountPool::new(
        accounts
            .iter()
            .map(|a| a.clone() as Arc<dyn AccountClient>)
            .collect(),
    );
    pool.connect_all().await?;

    let engine = Arc::new(RelayEngine::new(pool, EngineSettings::from_config(&config))?);
    engine.spawn()?;

    let cancel = shutdown::install_signal_handler();

    let mut listeners: Vec<JoinHandle<()>> = Vec::new();
    if config.watch.enabled {
        let settings = IngressSettings::from_config(&config.watch)?;
        info!(
            target_handle = settings.target_handle.as_deref().unwrap_or("*"),
            destination = %settings
                .destination
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "source chat".into()),
            "event ingress enabled"
        );
        let filter = Arc::new(engine.ingress_filter(settings));
        for (index, account) in accounts.iter().enumerate() {
            listeners.push(spawn_listener(
                account.bot().clone(),
                index,
                filter.clone(),
                engine.producer_token(),
            ));
        }
    }

    let gateway = if config.gateway.enabled {
        let gateway =
            HttpGateway::from_config(&config.gateway, engine.clone(), prometheus_render)?;
        gateway.spawn();
        Some(gateway)
    } else {
        None
    };

    if listeners.is_empty() && gateway.is_none() {
        warn!("neither [watch] nor [gateway] is enabled, nothing will be relayed");
    }

    cancel.cancelled().await;

    // Producers stop first, then the queue drains and the accounts close.
    engine.shutdown().await;
    if let Some(gateway) = gateway
        && let Err(e) = gateway.shutdown().await
    {
        warn!(error = %e, "gateway shutdown failed");
    }
    for listener in listeners {
        if let Err(e) = listener.await {
            warn!(error = %e, "listener ended abnormally");
        }
    }

    info!("herald serve shutdown complete");
    Ok(())
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("herald={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
