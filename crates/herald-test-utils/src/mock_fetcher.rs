// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stub photo fetcher serving canned responses per URL.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use herald_core::traits::fetch::PhotoFetcher;
use herald_core::HeraldError;

/// A `PhotoFetcher` that never touches the network.
///
/// Unknown URLs fail like a 404 would.
#[derive(Default)]
pub struct StubPhotoFetcher {
    responses: HashMap<String, Bytes>,
    fetched: Mutex<Vec<String>>,
}

impl StubPhotoFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_response(mut self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.responses.insert(url.into(), body.into());
        self
    }

    /// URLs requested so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PhotoFetcher for StubPhotoFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, HeraldError> {
        self.fetched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());
        match self.responses.get(url) {
            Some(body) if !body.is_empty() => Ok(body.clone()),
            Some(_) => Err(HeraldError::Fetch {
                message: format!("empty body from {url}"),
                source: None,
            }),
            None => Err(HeraldError::Fetch {
                message: format!("GET {url} returned 404 Not Found"),
                source: None,
            }),
        }
    }
}
