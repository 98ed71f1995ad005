// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns observed events into copy tasks.
//!
//! Every pooled account's listener hands its events to the same
//! [`IngressFilter`]. The filter drops history, senders without a handle,
//! senders other than the watched one, and duplicates already seen through
//! another account. Whatever survives is enqueued as a copy task bound to
//! the observing account.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info};

use herald_config::model::WatchConfig;
use herald_core::{ChatTarget, HeraldError, ObservedEvent, RelayTask};

use crate::dedup::{DedupEngine, Fingerprint};
use crate::queue::DispatchQueue;

/// What the filter did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressDecision {
    /// A copy task was queued; `depth` is the queue depth afterwards.
    Enqueued { depth: usize },
    /// The event predates the listener start.
    History,
    /// The sender has no public handle.
    NoHandle,
    /// The sender is not the watched handle.
    TargetMismatch,
    /// Another account already relayed this event.
    Duplicate,
}

/// Filter settings resolved from `[watch]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressSettings {
    /// Lowercased, without `@`. `None` accepts any sender with a handle.
    pub target_handle: Option<String>,
    /// Fixed destination; `None` relays back into the source chat.
    pub destination: Option<ChatTarget>,
    pub ignore_history: bool,
}

impl IngressSettings {
    pub fn from_config(config: &WatchConfig) -> Result<Self, HeraldError> {
        let destination = config
            .destination
            .as_deref()
            .map(str::parse::<ChatTarget>)
            .transpose()?;
        Ok(Self {
            target_handle: config
                .target_username
                .as_deref()
                .map(normalize_handle)
                .filter(|h| !h.is_empty()),
            destination,
            ignore_history: config.ignore_history,
        })
    }
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

/// Shared event filter feeding the dispatch queue.
#[derive(Debug)]
pub struct IngressFilter {
    settings: IngressSettings,
    started_at: DateTime<Utc>,
    dedup: Arc<DedupEngine>,
    queue: Arc<DispatchQueue>,
}

impl IngressFilter {
    /// A filter whose history cutoff is now.
    pub fn new(
        settings: IngressSettings,
        dedup: Arc<DedupEngine>,
        queue: Arc<DispatchQueue>,
    ) -> Self {
        Self::with_start_time(settings, dedup, queue, Utc::now())
    }

    /// A filter with an explicit history cutoff. Event times have whole
    /// second precision, so the cutoff is truncated to match.
    pub fn with_start_time(
        settings: IngressSettings,
        dedup: Arc<DedupEngine>,
        queue: Arc<DispatchQueue>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            settings,
            started_at: started_at.trunc_subsecs(0),
            dedup,
            queue,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Filters one event and enqueues a copy task when it survives.
    ///
    /// Only a closed queue is an error; every other outcome is a decision.
    pub fn handle(&self, event: &ObservedEvent) -> Result<IngressDecision, HeraldError> {
        if self.settings.ignore_history && event.event_time < self.started_at {
            debug!(
                chat_id = event.chat_id,
                message_id = event.message_id,
                "dropping history message"
            );
            return Ok(IngressDecision::History);
        }

        let Some(handle) = event
            .sender
            .as_ref()
            .and_then(|s| s.handle.as_deref())
            .filter(|h| !h.is_empty())
        else {
            debug!(chat_id = event.chat_id, "dropping message from sender without handle");
            return Ok(IngressDecision::NoHandle);
        };

        if let Some(target) = &self.settings.target_handle
            && normalize_handle(handle) != *target
        {
            return Ok(IngressDecision::TargetMismatch);
        }

        let fingerprint = Fingerprint::of_event(event);
        if !self.dedup.try_mark(fingerprint.clone()) {
            debug!(
                %fingerprint,
                account_index = event.account_index,
                "duplicate event suppressed"
            );
            #[cfg(feature = "prometheus")]
            herald_prometheus::record_dedup_suppressed();
            return Ok(IngressDecision::Duplicate);
        }

        let destination = self
            .settings
            .destination
            .clone()
            .unwrap_or(ChatTarget::Id(event.chat_id));
        let task = RelayTask::copy(
            destination.clone(),
            event.chat_id,
            event.message_id,
            event.account_index,
        );
        let depth = self.queue.enqueue(task)?;
        #[cfg(feature = "prometheus")]
        herald_prometheus::record_enqueued(depth);

        info!(
            sender = handle,
            source_chat = event.chat_id,
            message_id = event.message_id,
            %destination,
            account_index = event.account_index,
            depth,
            "event queued for relay"
        );
        Ok(IngressDecision::Enqueued { depth })
    }
}
