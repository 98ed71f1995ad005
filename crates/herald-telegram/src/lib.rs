// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram account client for the Herald relay.
//!
//! Each pooled account is one Bot API token driven through teloxide.
//! [`TelegramAccount`] implements [`AccountClient`]; the [`listener`]
//! module turns the account's incoming messages into observed events.

pub mod errors;
pub mod listener;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, Recipient};
use tracing::{debug, info};

use herald_config::model::AccountConfig;
use herald_core::error::HeraldError;
use herald_core::traits::{AccountClient, PluginAdapter};
use herald_core::types::{AdapterType, ChatTarget, HealthStatus, MessageRef};
use herald_core::SendError;

pub use listener::{event_from_message, spawn_listener};

/// One pooled Telegram account.
pub struct TelegramAccount {
    bot: Bot,
    name: String,
    connected: AtomicBool,
}

impl TelegramAccount {
    /// Creates an account from its `[[accounts]]` entry at `index`.
    pub fn new(config: &AccountConfig, index: usize) -> Result<Self, HeraldError> {
        let token = config.bot_token.trim();
        if token.is_empty() {
            return Err(HeraldError::Config(format!(
                "accounts[{index}].bot_token cannot be empty"
            )));
        }
        Ok(Self::with_bot(Bot::new(token), config.display_name(index)))
    }

    /// Wraps an existing bot, e.g. one pointed at a custom API URL.
    pub fn with_bot(bot: Bot, name: impl Into<String>) -> Self {
        Self {
            bot,
            name: name.into(),
            connected: AtomicBool::new(false),
        }
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn recipient(target: &ChatTarget) -> Recipient {
    match target {
        ChatTarget::Id(id) => Recipient::Id(ChatId(*id)),
        ChatTarget::Handle(handle) => Recipient::ChannelUsername(format!("@{handle}")),
    }
}

#[async_trait]
impl PluginAdapter for TelegramAccount {
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
        if !self.is_connected() {
            return Ok(HealthStatus::Unhealthy("not connected".into()));
        }
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        debug!(account = %self.name, "Telegram account shutting down");
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AccountClient for TelegramAccount {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), HeraldError> {
        let me = self.bot.get_me().await.map_err(|e| HeraldError::Channel {
            message: format!("login failed for account {}: {e}", self.name),
            source: Some(Box::new(e)),
        })?;
        self.connected.store(true, Ordering::SeqCst);
        info!(
            account = %self.name,
            bot_id = me.id.0,
            username = me.username.as_deref().unwrap_or(""),
            "Telegram account logged in"
        );
        Ok(())
    }

    async fn copy_message(
        &self,
        destination: &ChatTarget,
        source_chat: i64,
        source_message_id: i32,
    ) -> Result<MessageRef, SendError> {
        let copied = self
            .bot
            .copy_message(
                recipient(destination),
                ChatId(source_chat),
                MessageId(source_message_id),
            )
            .await
            .map_err(errors::classify)?;
        Ok(MessageRef {
            message_id: copied.0,
        })
    }

    async fn send_message(
        &self,
        destination: &ChatTarget,
        text: &str,
    ) -> Result<MessageRef, SendError> {
        let sent = self
            .bot
            .send_message(recipient(destination), text)
            .await
            .map_err(errors::classify)?;
        Ok(MessageRef {
            message_id: sent.id.0,
        })
    }

    async fn send_photo(
        &self,
        destination: &ChatTarget,
        photo: Bytes,
        caption: Option<&str>,
    ) -> Result<MessageRef, SendError> {
        let file = InputFile::memory(photo.to_vec()).file_name("photo.jpg");
        let mut request = self.bot.send_photo(recipient(destination), file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        let sent = request.await.map_err(errors::classify)?;
        Ok(MessageRef {
            message_id: sent.id.0,
        })
    }
}
