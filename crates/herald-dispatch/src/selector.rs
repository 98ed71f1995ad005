// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-destination account selection.
//!
//! Each destination keeps its own round-robin cursor and usage counts, so
//! fairness holds per destination and not globally.

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use strum::{Display, EnumString};
use tracing::warn;

use herald_core::types::ChatTarget;
use herald_core::HeraldError;

/// How the selector spreads tasks over the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DistributionPolicy {
    RoundRobin,
    Random,
    FixedFirst,
}

impl DistributionPolicy {
    /// Parses a configured policy name. Unknown names fall back to
    /// `FixedFirst` and log a warning.
    pub fn from_config(name: &str) -> Self {
        match name.trim().parse() {
            Ok(policy) => policy,
            Err(_) => {
                warn!(
                    policy = name,
                    "unknown distribution strategy, every task will use account 0"
                );
                DistributionPolicy::FixedFirst
            }
        }
    }
}

#[derive(Debug, Default)]
struct DistributionState {
    cursor: usize,
    usage: Vec<u64>,
}

/// Chooses the account index for each task.
#[derive(Debug)]
pub struct Selector {
    policy: DistributionPolicy,
    account_count: usize,
    state: DashMap<ChatTarget, DistributionState>,
}

impl Selector {
    pub fn new(policy: DistributionPolicy, account_count: usize) -> Self {
        Self {
            policy,
            account_count,
            state: DashMap::new(),
        }
    }

    pub fn policy(&self) -> DistributionPolicy {
        self.policy
    }

    /// Picks an account for `destination` using the thread-local RNG.
    pub fn select(&self, destination: &ChatTarget) -> Result<usize, HeraldError> {
        self.select_with_rng(destination, &mut rand::thread_rng())
    }

    /// Picks an account for `destination`.
    ///
    /// The per-destination entry stays locked for the whole read-modify-write,
    /// so concurrent callers never observe the same cursor value.
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        destination: &ChatTarget,
        rng: &mut R,
    ) -> Result<usize, HeraldError> {
        let n = self.account_count;
        if n == 0 {
            return Err(HeraldError::NoAccountsAvailable);
        }

        match self.policy {
            DistributionPolicy::FixedFirst => Ok(0),
            DistributionPolicy::RoundRobin => {
                let mut state = self.state.entry(destination.clone()).or_default();
                let index = state.cursor % n;
                state.cursor = state.cursor.wrapping_add(1);
                Ok(index)
            }
            DistributionPolicy::Random => {
                let mut state = self.state.entry(destination.clone()).or_default();
                if state.usage.len() != n {
                    state.usage.resize(n, 0);
                }
                let min = state.usage.iter().copied().min().unwrap_or(0);
                let tied: Vec<usize> = state
                    .usage
                    .iter()
                    .enumerate()
                    .filter(|(_, count)| **count == min)
                    .map(|(i, _)| i)
                    .collect();
                let index = tied.choose(rng).copied().unwrap_or(0);
                state.usage[index] += 1;
                Ok(index)
            }
        }
    }

    /// Usage counts recorded for `destination` under the random policy.
    pub fn usage(&self, destination: &ChatTarget) -> Vec<u64> {
        self.state
            .get(destination)
            .map(|s| s.usage.clone())
            .unwrap_or_default()
    }
}
