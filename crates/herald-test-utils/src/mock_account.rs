// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock account client for deterministic testing.
//!
//! `MockAccount` implements `AccountClient`. Every copy/send attempt is
//! captured with the (tokio) time it happened, and failures can be scripted
//! ahead of time; unscripted calls succeed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use herald_core::traits::account::AccountClient;
use herald_core::traits::adapter::PluginAdapter;
use herald_core::types::{AdapterType, ChatTarget, HealthStatus, MessageRef};
use herald_core::{HeraldError, SendError};

/// One captured call against a [`MockAccount`].
#[derive(Debug, Clone, PartialEq)]
pub enum AccountCall {
    Copy {
        destination: ChatTarget,
        source_chat: i64,
        source_message_id: i32,
    },
    Text {
        destination: ChatTarget,
        text: String,
    },
    Photo {
        destination: ChatTarget,
        size: usize,
        caption: Option<String>,
    },
}

impl AccountCall {
    /// Destination of the call, whatever its kind.
    pub fn destination(&self) -> &ChatTarget {
        match self {
            AccountCall::Copy { destination, .. }
            | AccountCall::Text { destination, .. }
            | AccountCall::Photo { destination, .. } => destination,
        }
    }
}

/// A mock chat account for testing.
pub struct MockAccount {
    name: String,
    connected: AtomicBool,
    fail_connect: bool,
    shut_down: AtomicBool,
    script: Mutex<VecDeque<SendError>>,
    calls: Mutex<Vec<(AccountCall, Instant)>>,
    next_message_id: AtomicI32,
}

impl MockAccount {
    /// A connected account whose calls all succeed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(true),
            fail_connect: false,
            shut_down: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI32::new(1),
        }
    }

    /// An account that reports itself disconnected.
    pub fn disconnected(name: impl Into<String>) -> Self {
        let account = Self::new(name);
        account.connected.store(false, Ordering::SeqCst);
        account
    }

    /// A disconnected account whose `connect()` fails.
    pub fn failing_connect(name: impl Into<String>) -> Self {
        let mut account = Self::disconnected(name);
        account.fail_connect = true;
        account
    }

    /// Queue an error for the next call. Errors are consumed in order.
    pub fn push_error(&self, error: SendError) {
        lock(&self.script).push_back(error);
    }

    /// Every captured call, in order.
    pub fn calls(&self) -> Vec<AccountCall> {
        lock(&self.calls).iter().map(|(c, _)| c.clone()).collect()
    }

    /// The time of every captured call, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        lock(&self.calls).iter().map(|(_, t)| *t).collect()
    }

    /// Number of captured calls.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Whether `shutdown()` was called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn record(&self, call: AccountCall) -> Result<MessageRef, SendError> {
        lock(&self.calls).push((call, Instant::now()));
        if let Some(error) = lock(&self.script).pop_front() {
            return Err(error);
        }
        Ok(MessageRef {
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockAccount {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Account
    }

    async fn health_check(&self) -> Result<HealthStatus, HeraldError> {
        if self.is_connected() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("not connected".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.shut_down.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AccountClient for MockAccount {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), HeraldError> {
        if self.fail_connect {
            return Err(HeraldError::Channel {
                message: format!("{} rejected the login", self.name),
                source: None,
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn copy_message(
        &self,
        destination: &ChatTarget,
        source_chat: i64,
        source_message_id: i32,
    ) -> Result<MessageRef, SendError> {
        self.record(AccountCall::Copy {
            destination: destination.clone(),
            source_chat,
            source_message_id,
        })
    }

    async fn send_message(
        &self,
        destination: &ChatTarget,
        text: &str,
    ) -> Result<MessageRef, SendError> {
        self.record(AccountCall::Text {
            destination: destination.clone(),
            text: text.to_string(),
        })
    }

    async fn send_photo(
        &self,
        destination: &ChatTarget,
        photo: Bytes,
        caption: Option<&str>,
    ) -> Result<MessageRef, SendError> {
        self.record(AccountCall::Photo {
            destination: destination.clone(),
            size: photo.len(),
            caption: caption.map(str::to_string),
        })
    }
}
