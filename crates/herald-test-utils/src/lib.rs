// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Herald integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a live chat service.
//!
//! # Components
//!
//! - [`MockAccount`] - Account client with scripted failures and captured calls
//! - [`StubPhotoFetcher`] - Photo fetcher serving canned bytes per URL
//! - [`TestHarness`] - A relay engine over mock accounts with zero pacing

pub mod harness;
pub mod mock_account;
pub mod mock_fetcher;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_account::{AccountCall, MockAccount};
pub use mock_fetcher::StubPhotoFetcher;
