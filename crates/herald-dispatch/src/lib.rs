// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch engine for the Herald relay.
//!
//! Ingress adapters feed [`RelayTask`](herald_core::RelayTask)s into a FIFO
//! [`DispatchQueue`]. A single [`DispatchWorker`] drains it: it picks an
//! account through the [`Selector`], waits out a humanized [`DelayPlan`],
//! and sends through the [`AccountPool`], retrying once on a rate limit.
//! Events observed by several accounts at once are collapsed by the
//! [`DedupEngine`] before they become tasks.
//!
//! [`RelayEngine`] owns all of it and drives startup and shutdown.

pub mod dedup;
pub mod delay;
pub mod engine;
pub mod ingress;
pub mod pool;
pub mod queue;
pub mod selector;
pub mod worker;

pub use dedup::{DedupEngine, Fingerprint};
pub use delay::{DelayModel, DelayParameters, DelayPlan};
pub use engine::{EngineSettings, RelayEngine};
pub use ingress::{IngressDecision, IngressFilter, IngressSettings};
pub use pool::{AccountHandle, AccountPool};
pub use queue::DispatchQueue;
pub use selector::{DistributionPolicy, Selector};
pub use worker::{DispatchStats, DispatchWorker, StatsSnapshot, WorkerState};
