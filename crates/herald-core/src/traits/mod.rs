// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod account;
pub mod adapter;
pub mod fetch;

pub use account::AccountClient;
pub use adapter::PluginAdapter;
pub use fetch::PhotoFetcher;
