// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Herald relay.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across Herald adapters and the dispatch engine.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Configuration errors. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-supplied input failed validation (HTTP boundary, task construction).
    #[error("validation error: {0}")]
    Validation(String),

    /// A destination string is neither a chat id nor an `@handle`.
    #[error("invalid destination `{0}`")]
    InvalidDestination(String),

    /// The account pool is empty; selection cannot proceed.
    #[error("no accounts available in the pool")]
    NoAccountsAvailable,

    /// An account index outside `0..count` was requested.
    #[error("unknown account index {index} (pool has {count} accounts)")]
    UnknownAccount { index: usize, count: usize },

    /// The dispatch queue no longer accepts tasks.
    #[error("dispatch queue is closed")]
    QueueClosed,

    /// Fetching remote content (e.g. a photo URL) failed.
    #[error("fetch error: {message}")]
    Fetch {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Chat transport errors outside the send path (connect, health, listener).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure of a single copy/send call against an account.
///
/// The dispatch worker owns the retry policy; clients only classify.
#[derive(Debug, Error)]
pub enum SendError {
    /// The transport asked us to back off for the given duration.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The account cannot resolve or post to the destination.
    #[error("account cannot access destination: {reason}")]
    NotMember { reason: String },

    /// Any other transport failure.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SendError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        SendError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for [`SendError::RateLimited`].
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SendError::RateLimited { .. })
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SendError::RateLimited { .. } => "rate_limited",
            SendError::NotMember { .. } => "not_member",
            SendError::Transport { .. } => "transport",
        }
    }
}
