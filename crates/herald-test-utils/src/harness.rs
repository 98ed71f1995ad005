// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end dispatch testing.
//!
//! `TestHarness` assembles a spawned [`RelayEngine`] over [`MockAccount`]s
//! with zero pacing, so scenarios run instantly (or under paused time).

use std::sync::Arc;
use std::time::Duration;

use herald_core::{AccountClient, HeraldError};
use herald_dispatch::{
    AccountPool, DelayParameters, DistributionPolicy, EngineSettings, IngressFilter,
    IngressSettings, RelayEngine,
};

use crate::mock_account::MockAccount;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    accounts: usize,
    settings: EngineSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            accounts: 1,
            settings: EngineSettings {
                delay: DelayParameters::zero(),
                ..EngineSettings::default()
            },
        }
    }

    /// Number of mock accounts, named `acct0`, `acct1`, ...
    pub fn with_accounts(mut self, n: usize) -> Self {
        self.accounts = n;
        self
    }

    pub fn with_policy(mut self, policy: DistributionPolicy) -> Self {
        self.settings.policy = policy;
        self
    }

    pub fn with_delay(mut self, delay: DelayParameters) -> Self {
        self.settings.delay = delay;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.settings.retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.settings.sweep_interval = interval;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.settings.drain_timeout = timeout;
        self
    }

    /// Build the engine and spawn its worker and sweeper.
    pub fn build(self) -> Result<TestHarness, HeraldError> {
        let accounts: Vec<Arc<MockAccount>> = (0..self.accounts)
            .map(|i| Arc::new(MockAccount::new(format!("acct{i}"))))
            .collect();
        let pool = AccountPool::new(
            accounts
                .iter()
                .map(|a| a.clone() as Arc<dyn AccountClient>)
                .collect(),
        );
        let engine = Arc::new(RelayEngine::new(pool, self.settings)?);
        engine.spawn()?;
        Ok(TestHarness { engine, accounts })
    }
}

/// A running relay engine over mock accounts.
pub struct TestHarness {
    pub engine: Arc<RelayEngine>,
    pub accounts: Vec<Arc<MockAccount>>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn account(&self, index: usize) -> &Arc<MockAccount> {
        &self.accounts[index]
    }

    /// An ingress filter bound to this engine.
    pub fn filter(&self, settings: IngressSettings) -> IngressFilter {
        self.engine.ingress_filter(settings)
    }

    /// Wait until every queued task has finished.
    pub async fn settle(&self) {
        self.engine.queue().join().await;
    }

    /// Total captured calls across all accounts.
    pub fn total_calls(&self) -> usize {
        self.accounts.iter().map(|a| a.call_count()).sum()
    }
}
