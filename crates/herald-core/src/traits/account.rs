// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat account client trait.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{HeraldError, SendError};
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatTarget, MessageRef};

/// One chat account able to copy and send messages.
///
/// Implementations classify failures into [`SendError`] and never retry;
/// retry policy belongs to the dispatch worker.
#[async_trait]
pub trait AccountClient: PluginAdapter {
    /// Whether the account currently has a live session.
    fn is_connected(&self) -> bool;

    /// Establishes the session. Called once at startup.
    async fn connect(&self) -> Result<(), HeraldError>;

    /// Copies `source_message_id` from `source_chat` into `destination`
    /// without a forward header.
    async fn copy_message(
        &self,
        destination: &ChatTarget,
        source_chat: i64,
        source_message_id: i32,
    ) -> Result<MessageRef, SendError>;

    /// Sends a plain text message.
    async fn send_message(
        &self,
        destination: &ChatTarget,
        text: &str,
    ) -> Result<MessageRef, SendError>;

    /// Sends a photo with an optional caption.
    async fn send_photo(
        &self,
        destination: &ChatTarget,
        photo: Bytes,
        caption: Option<&str>,
    ) -> Result<MessageRef, SendError>;
}
