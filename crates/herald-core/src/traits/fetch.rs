// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote content fetcher used by ingress adapters.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::HeraldError;

/// Resolves a photo URL into raw bytes before a task is created.
#[async_trait]
pub trait PhotoFetcher: Send + Sync + 'static {
    /// Downloads `url`. Empty bodies and non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<Bytes, HeraldError>;
}
