// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account long-polling listener.
//!
//! Converts every incoming message into an [`ObservedEvent`] and hands it
//! to the shared [`IngressFilter`]. All accounts feed the same filter, so a
//! message seen by several accounts is relayed once.

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use herald_core::{EventSender, HeraldError, ObservedEvent};
use herald_dispatch::{IngressDecision, IngressFilter};

/// Delay between stop attempts while the dispatcher is still starting up.
const STOP_RETRY: Duration = Duration::from_millis(50);

/// Label for the media a message carries, if any.
fn media_tag(msg: &Message) -> Option<&'static str> {
    if msg.photo().is_some() {
        Some("photo")
    } else if msg.video().is_some() {
        Some("video")
    } else if msg.animation().is_some() {
        Some("animation")
    } else if msg.document().is_some() {
        Some("document")
    } else if msg.audio().is_some() {
        Some("audio")
    } else if msg.voice().is_some() {
        Some("voice")
    } else if msg.video_note().is_some() {
        Some("video_note")
    } else if msg.sticker().is_some() {
        Some("sticker")
    } else {
        None
    }
}

/// Converts a Telegram message seen by account `account_index`.
///
/// A caption counts as the message text.
pub fn event_from_message(account_index: usize, msg: &Message) -> ObservedEvent {
    ObservedEvent {
        account_index,
        sender: msg.from.as_ref().map(|user| EventSender {
            id: user.id.0,
            handle: user.username.clone(),
            is_bot: user.is_bot,
        }),
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media_tag: media_tag(msg).map(str::to_string),
        event_time: msg.date,
    }
}

/// Runs one message through the filter, logging the decision.
pub fn relay_message(
    filter: &IngressFilter,
    account_index: usize,
    msg: &Message,
) -> Result<IngressDecision, HeraldError> {
    let event = event_from_message(account_index, msg);
    let decision = filter.handle(&event)?;
    if !matches!(decision, IngressDecision::Enqueued { .. }) {
        debug!(
            account_index,
            chat_id = event.chat_id,
            message_id = event.message_id,
            ?decision,
            "message not relayed"
        );
    }
    Ok(decision)
}

/// Starts long polling for `bot` and feeds messages to `filter` until
/// `cancel` fires.
pub fn spawn_listener(
    bot: Bot,
    account_index: usize,
    filter: Arc<IngressFilter>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let handler = Update::filter_message().endpoint(move |msg: Message| {
            let filter = filter.clone();
            async move {
                if let Err(e) = relay_message(&filter, account_index, &msg) {
                    warn!(account_index, error = %e, "dropping observed message");
                }
                respond(())
            }
        });

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .default_handler(|_| async {})
            .build();

        let shutdown = dispatcher.shutdown_token();
        let finished = CancellationToken::new();
        tokio::spawn(stop_on_cancel(
            move || shutdown.shutdown().is_ok(),
            cancel.clone(),
            finished.clone(),
        ));

        if cancel.is_cancelled() {
            finished.cancel();
            info!(account_index, "listener cancelled before polling started");
            return;
        }

        info!(account_index, "listening for messages");
        dispatcher.dispatch().await;
        finished.cancel();
        info!(account_index, "listener stopped");
    })
}

/// Waits for `cancel`, then calls `try_stop` until it accepts the request.
///
/// `try_stop` returns `false` while the dispatcher is not running yet, so a
/// cancellation that lands during startup is retried. Gives up once
/// `finished` fires.
async fn stop_on_cancel<F>(mut try_stop: F, cancel: CancellationToken, finished: CancellationToken)
where
    F: FnMut() -> bool,
{
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = finished.cancelled() => return,
    }
    loop {
        if try_stop() {
            return;
        }
        debug!("dispatcher not running yet, retrying stop");
        tokio::select! {
            _ = tokio::time::sleep(STOP_RETRY) => {}
            _ = finished.cancelled() => return,
        }
    }
}
