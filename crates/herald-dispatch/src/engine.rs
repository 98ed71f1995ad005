// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composition of the dispatch components.
//!
//! `RelayEngine` owns every piece of shared dispatch state and hands out
//! `Arc`s to the ingress adapters. Shutdown runs in a fixed order: stop
//! producers, drain the queue up to a timeout, stop the worker and the
//! sweeper, then shut the accounts down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use herald_config::HeraldConfig;
use herald_core::{HeraldError, RelayTask};

use crate::dedup::DedupEngine;
use crate::delay::{DelayModel, DelayParameters};
use crate::ingress::{IngressFilter, IngressSettings};
use crate::pool::AccountPool;
use crate::queue::DispatchQueue;
use crate::selector::{DistributionPolicy, Selector};
use crate::worker::{DispatchStats, DispatchWorker, StatsSnapshot, WorkerState};

/// Engine tunables, usually taken from [`HeraldConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub policy: DistributionPolicy,
    pub delay: DelayParameters,
    pub sweep_interval: Duration,
    pub retention: Duration,
    pub drain_timeout: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &HeraldConfig) -> Self {
        Self {
            policy: DistributionPolicy::from_config(&config.dispatch.distribution_strategy),
            delay: DelayParameters::from(&config.delay),
            sweep_interval: Duration::from_secs(config.dedup.sweep_interval_secs),
            retention: Duration::from_secs(config.dedup.retention_secs),
            drain_timeout: Duration::from_secs(config.dispatch.drain_timeout_secs),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            policy: DistributionPolicy::RoundRobin,
            delay: DelayParameters::default(),
            sweep_interval: Duration::from_secs(300),
            retention: Duration::from_secs(1800),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Owner of the pool, selector, dedup table, delay model, queue, and worker.
pub struct RelayEngine {
    pool: Arc<AccountPool>,
    selector: Arc<Selector>,
    dedup: Arc<DedupEngine>,
    delay: Arc<DelayModel>,
    queue: Arc<DispatchQueue>,
    stats: Arc<DispatchStats>,
    state_tx: watch::Sender<WorkerState>,
    settings: EngineSettings,
    producers: CancellationToken,
    worker_cancel: CancellationToken,
    sweep_cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayEngine {
    /// Builds the engine. Fails on invalid delay parameters or an empty pool.
    pub fn new(pool: AccountPool, settings: EngineSettings) -> Result<Self, HeraldError> {
        if pool.is_empty() {
            return Err(HeraldError::NoAccountsAvailable);
        }
        let delay = DelayModel::new(settings.delay.clone())?;
        let selector = Selector::new(settings.policy, pool.count());
        let (state_tx, _) = watch::channel(WorkerState::WaitingForTask);

        info!(
            accounts = pool.count(),
            policy = %settings.policy,
            "relay engine configured"
        );

        Ok(Self {
            pool: Arc::new(pool),
            selector: Arc::new(selector),
            dedup: Arc::new(DedupEngine::new(settings.retention)),
            delay: Arc::new(delay),
            queue: Arc::new(DispatchQueue::new()),
            stats: Arc::new(DispatchStats::default()),
            state_tx,
            settings,
            producers: CancellationToken::new(),
            worker_cancel: CancellationToken::new(),
            sweep_cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Starts the dispatch worker and the dedup sweeper.
    ///
    /// Must be called from within a tokio runtime, at most once.
    pub fn spawn(&self) -> Result<(), HeraldError> {
        let rx = self
            .queue
            .take_receiver()
            .ok_or_else(|| HeraldError::Internal("relay engine already spawned".into()))?;

        let worker = DispatchWorker::new(
            self.pool.clone(),
            self.selector.clone(),
            self.delay.clone(),
            self.queue.clone(),
            self.stats.clone(),
            self.state_tx.clone(),
        );
        let worker_handle = tokio::spawn(worker.run(rx, self.worker_cancel.clone()));
        let sweep_handle = tokio::spawn(
            self.dedup
                .clone()
                .run_sweeper(self.settings.sweep_interval, self.sweep_cancel.clone()),
        );

        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        tasks.push(worker_handle);
        tasks.push(sweep_handle);
        Ok(())
    }

    /// Queues a task for dispatch and returns how many tasks wait ahead of
    /// the worker, this one included.
    pub fn enqueue(&self, task: RelayTask) -> Result<usize, HeraldError> {
        let depth = self.queue.enqueue(task)?;
        #[cfg(feature = "prometheus")]
        herald_prometheus::record_enqueued(depth);
        Ok(depth)
    }

    /// An event filter sharing this engine's dedup table and queue.
    pub fn ingress_filter(&self, settings: IngressSettings) -> IngressFilter {
        IngressFilter::new(settings, self.dedup.clone(), self.queue.clone())
    }

    /// A token cancelled when shutdown begins. Ingress adapters stop
    /// producing when it fires.
    pub fn producer_token(&self) -> CancellationToken {
        self.producers.child_token()
    }

    pub fn pool(&self) -> &Arc<AccountPool> {
        &self.pool
    }

    pub fn dedup(&self) -> &Arc<DedupEngine> {
        &self.dedup
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    /// Tasks waiting for the worker, not counting the one being sent.
    pub fn queue_len(&self) -> usize {
        self.queue.waiting()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Follows worker state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state_tx.subscribe()
    }

    /// Shuts down with the configured drain timeout.
    pub async fn shutdown(&self) {
        self.shutdown_with_timeout(self.settings.drain_timeout).await;
    }

    /// Stops producers, waits up to `drain_timeout` for queued tasks to
    /// finish, then stops the worker and shuts the accounts down.
    pub async fn shutdown_with_timeout(&self, drain_timeout: Duration) {
        info!(
            pending = self.queue.len(),
            timeout_secs = drain_timeout.as_secs_f64(),
            "relay engine shutting down"
        );
        self.producers.cancel();
        self.queue.close();

        match tokio::time::timeout(drain_timeout, self.queue.join()).await {
            Ok(()) => info!("dispatch queue drained"),
            Err(_) => warn!(
                remaining = self.queue.len(),
                "drain timeout reached, abandoning remaining tasks"
            ),
        }

        self.worker_cancel.cancel();
        self.sweep_cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "dispatch task ended abnormally");
            }
        }

        self.pool.shutdown_all().await;
        let stats = self.stats.snapshot();
        info!(
            completed = stats.completed,
            failed = stats.failed,
            rate_limited = stats.rate_limited,
            "relay engine stopped"
        );
    }
}
