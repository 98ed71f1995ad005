// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of Bot API failures into [`SendError`].

use std::time::Duration;

use teloxide::{ApiError, RequestError};

use herald_core::SendError;

/// Maps a teloxide request failure onto the worker's retry taxonomy.
///
/// Flood control becomes `RateLimited`. Errors meaning the bot cannot reach
/// the chat become `NotMember`. Everything else is `Transport`.
pub fn classify(err: RequestError) -> SendError {
    match err {
        RequestError::RetryAfter(secs) => SendError::RateLimited {
            retry_after: Duration::from_secs(u64::from(secs.seconds())),
        },
        RequestError::Api(
            ref api @ (ApiError::ChatNotFound
            | ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup),
        ) => SendError::NotMember {
            reason: api.to_string(),
        },
        RequestError::Api(ApiError::Unknown(ref description)) if lacks_rights(description) => {
            SendError::NotMember {
                reason: description.clone(),
            }
        }
        other => SendError::Transport {
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}

fn lacks_rights(description: &str) -> bool {
    let lower = description.to_ascii_lowercase();
    lower.contains("not enough rights")
        || lower.contains("have no rights")
        || lower.contains("chat_write_forbidden")
        || lower.contains("not a member")
}
