// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Photo download for `photo=<url>` submissions.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use herald_core::{HeraldError, PhotoFetcher};

/// Default time allowed for a photo download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether `value` looks like a URL the fetcher accepts.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Downloads photos over HTTP(S) with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPhotoFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPhotoFetcher {
    pub fn new(timeout: Duration) -> Result<Self, HeraldError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::Fetch {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PhotoFetcher for HttpPhotoFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, HeraldError> {
        if !is_http_url(url) {
            return Err(HeraldError::Validation(format!(
                "photo URL must start with http:// or https://, got `{url}`"
            )));
        }

        let timeout = self.timeout;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                HeraldError::Timeout { duration: timeout }
            } else {
                HeraldError::Fetch {
                    message: format!("GET {url} failed: {e}"),
                    source: Some(Box::new(e)),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(HeraldError::Fetch {
                message: format!("GET {url} returned {status}"),
                source: None,
            });
        }

        let body = response.bytes().await.map_err(map_err)?;
        if body.is_empty() {
            return Err(HeraldError::Fetch {
                message: format!("empty body from {url}"),
                source: None,
            });
        }
        debug!(url, size = body.len(), "photo downloaded");
        Ok(body)
    }
}
