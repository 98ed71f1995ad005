// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Herald relay.
//!
//! Provides the error taxonomy, the task and destination types that flow
//! through the dispatch engine, and the adapter traits implemented by chat
//! clients and ingress helpers.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{HeraldError, SendError};
pub use types::{
    AdapterType, ChatTarget, EventSender, HealthStatus, MessageRef, ObservedEvent, RelayTask,
    TaskContent,
};

pub use traits::{AccountClient, PhotoFetcher, PluginAdapter};
