// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the dispatch engine and its adapters.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use strum::{Display, EnumString};

use crate::error::HeraldError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum AdapterType {
    Account,
    Ingress,
    Observability,
}

/// A chat destination: numeric id or `@handle`.
///
/// Handles are stored without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Id(i64),
    Handle(String),
}

impl ChatTarget {
    /// Numeric id, if this target is one.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            ChatTarget::Id(id) => Some(*id),
            ChatTarget::Handle(_) => None,
        }
    }
}

impl FromStr for ChatTarget {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(ChatTarget::Id(id));
        }
        let handle = trimmed
            .strip_prefix('@')
            .ok_or_else(|| HeraldError::InvalidDestination(s.to_string()))?;
        let valid = !handle.is_empty()
            && handle.len() <= 64
            && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(HeraldError::InvalidDestination(s.to_string()));
        }
        Ok(ChatTarget::Handle(handle.to_string()))
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{id}"),
            ChatTarget::Handle(h) => write!(f, "@{h}"),
        }
    }
}

impl Serialize for ChatTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChatTarget::Id(id) => serializer.serialize_i64(*id),
            ChatTarget::Handle(_) => serializer.collect_str(self),
        }
    }
}

/// Reference to a message produced by a successful copy/send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub message_id: i32,
}

/// What a relay task delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskContent {
    /// Copy an existing message. The id is only meaningful to the account
    /// that observed it, so the copy must go through that account.
    Copy {
        source_chat: i64,
        source_message_id: i32,
        source_account_index: usize,
    },
    /// Send new content. At least one field is present.
    Inline {
        text: Option<String>,
        photo: Option<Bytes>,
    },
}

impl TaskContent {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskContent::Copy { .. } => "copy",
            TaskContent::Inline { photo: Some(_), .. } => "photo",
            TaskContent::Inline { .. } => "text",
        }
    }
}

/// The unit of work consumed by the dispatch worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayTask {
    /// Sequence number assigned by the dispatch queue on enqueue.
    pub id: u64,
    pub destination: ChatTarget,
    pub content: TaskContent,
    pub forced_account_index: Option<usize>,
    pub enqueued_at: DateTime<Utc>,
}

impl RelayTask {
    /// A task that copies `source_message_id` from `source_chat` as seen by
    /// the account at `source_account_index`.
    pub fn copy(
        destination: ChatTarget,
        source_chat: i64,
        source_message_id: i32,
        source_account_index: usize,
    ) -> Self {
        Self {
            id: 0,
            destination,
            content: TaskContent::Copy {
                source_chat,
                source_message_id,
                source_account_index,
            },
            forced_account_index: None,
            enqueued_at: Utc::now(),
        }
    }

    /// A task that sends new text and/or photo content.
    ///
    /// Empty text and zero-length photos count as absent; a task with
    /// neither is rejected.
    pub fn inline(
        destination: ChatTarget,
        text: Option<String>,
        photo: Option<Bytes>,
    ) -> Result<Self, HeraldError> {
        let text = text.filter(|t| !t.trim().is_empty());
        let photo = photo.filter(|p| !p.is_empty());
        if text.is_none() && photo.is_none() {
            return Err(HeraldError::Validation(
                "a relay task needs text or a photo".to_string(),
            ));
        }
        Ok(Self {
            id: 0,
            destination,
            content: TaskContent::Inline { text, photo },
            forced_account_index: None,
            enqueued_at: Utc::now(),
        })
    }

    /// Pin this task to a specific account instead of the selection policy.
    pub fn with_forced_account(mut self, index: usize) -> Self {
        self.forced_account_index = Some(index);
        self
    }
}

/// Sender details attached to an observed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSender {
    pub id: u64,
    pub handle: Option<String>,
    pub is_bot: bool,
}

/// A message observed by one pooled account's event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEvent {
    pub account_index: usize,
    pub sender: Option<EventSender>,
    pub chat_id: i64,
    pub message_id: i32,
    pub text: Option<String>,
    pub media_tag: Option<String>,
    pub event_time: DateTime<Utc>,
}
