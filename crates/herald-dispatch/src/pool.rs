// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexed pool of sender accounts.
//!
//! Indices are stable for the process lifetime. The pool checks that an
//! account exists and is connected before every call and never retries;
//! retry policy lives in the worker.

use std::sync::Arc;
#[cfg(feature = "prometheus")]
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, warn};

use herald_core::types::{ChatTarget, MessageRef};
use herald_core::{AccountClient, HeraldError, SendError};

/// One pooled account: its stable index, display name, and client.
#[derive(Clone)]
pub struct AccountHandle {
    pub index: usize,
    pub name: String,
    pub client: Arc<dyn AccountClient>,
}

impl std::fmt::Debug for AccountHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountHandle")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("connected", &self.client.is_connected())
            .finish()
    }
}

/// The fixed set of accounts, addressed by index `0..count()`.
#[derive(Debug, Default)]
pub struct AccountPool {
    accounts: Vec<AccountHandle>,
}

impl AccountPool {
    /// Builds a pool in the given order. Names come from each client.
    pub fn new(clients: Vec<Arc<dyn AccountClient>>) -> Self {
        let accounts = clients
            .into_iter()
            .enumerate()
            .map(|(index, client)| AccountHandle {
                index,
                name: client.name().to_string(),
                client,
            })
            .collect();
        Self { accounts }
    }

    pub fn count(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&AccountHandle, HeraldError> {
        self.accounts.get(index).ok_or(HeraldError::UnknownAccount {
            index,
            count: self.accounts.len(),
        })
    }

    /// Display name for logs; `"?"` for an unknown index.
    pub fn name(&self, index: usize) -> &str {
        self.accounts.get(index).map_or("?", |a| a.name.as_str())
    }

    pub fn is_connected(&self, index: usize) -> bool {
        self.accounts
            .get(index)
            .is_some_and(|a| a.client.is_connected())
    }

    pub fn connected_count(&self) -> usize {
        self.accounts
            .iter()
            .filter(|a| a.client.is_connected())
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountHandle> {
        self.accounts.iter()
    }

    /// Copies a message into `destination` through account `index`.
    pub async fn copy(
        &self,
        index: usize,
        destination: &ChatTarget,
        source_chat: i64,
        source_message_id: i32,
    ) -> Result<MessageRef, SendError> {
        let account = self.usable(index)?;
        #[cfg(feature = "prometheus")]
        let started = Instant::now();

        let result = account
            .client
            .copy_message(destination, source_chat, source_message_id)
            .await;

        #[cfg(feature = "prometheus")]
        herald_prometheus::record_send_latency("copy", started.elapsed().as_secs_f64());
        result
    }

    /// Sends new content through account `index`.
    ///
    /// With a photo, the text becomes its caption. Text alone is sent as a
    /// plain message.
    pub async fn send(
        &self,
        index: usize,
        destination: &ChatTarget,
        text: Option<&str>,
        photo: Option<Bytes>,
    ) -> Result<MessageRef, SendError> {
        let account = self.usable(index)?;
        #[cfg(feature = "prometheus")]
        let started = Instant::now();

        #[cfg(feature = "prometheus")]
        let kind = if photo.is_some() { "photo" } else { "text" };

        let result = match (photo, text) {
            (Some(photo), caption) => account.client.send_photo(destination, photo, caption).await,
            (None, Some(text)) => account.client.send_message(destination, text).await,
            (None, None) => return Err(SendError::transport("nothing to send")),
        };

        #[cfg(feature = "prometheus")]
        herald_prometheus::record_send_latency(kind, started.elapsed().as_secs_f64());
        result
    }

    /// Connects every account. The first failure aborts startup.
    pub async fn connect_all(&self) -> Result<(), HeraldError> {
        for account in &self.accounts {
            account.client.connect().await.map_err(|e| {
                HeraldError::Channel {
                    message: format!("account {} failed to connect: {e}", account.name),
                    source: Some(Box::new(e)),
                }
            })?;
            info!(index = account.index, account = %account.name, "account connected");
        }
        Ok(())
    }

    /// Shuts every account down. Failures are logged, not propagated.
    pub async fn shutdown_all(&self) {
        for account in &self.accounts {
            match account.client.shutdown().await {
                Ok(()) => debug!(account = %account.name, "account shut down"),
                Err(e) => warn!(account = %account.name, error = %e, "account shutdown failed"),
            }
        }
    }

    fn usable(&self, index: usize) -> Result<&AccountHandle, SendError> {
        let account = self
            .accounts
            .get(index)
            .ok_or_else(|| SendError::transport(format!("unknown account index {index}")))?;
        if !account.client.is_connected() {
            return Err(SendError::transport(format!(
                "account {} is not connected",
                account.name
            )));
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_test_utils::{AccountCall, MockAccount};

    fn pool_of(accounts: &[Arc<MockAccount>]) -> AccountPool {
        AccountPool::new(
            accounts
                .iter()
                .map(|a| a.clone() as Arc<dyn AccountClient>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn send_with_photo_uses_text_as_caption() {
        let account = Arc::new(MockAccount::new("alpha"));
        let pool = pool_of(&[account.clone()]);
        let dest = ChatTarget::Id(-1);

        pool.send(0, &dest, Some("look"), Some(Bytes::from_static(b"img")))
            .await
            .unwrap();
        pool.send(0, &dest, Some("plain"), None).await.unwrap();

        assert_eq!(
            account.calls(),
            vec![
                AccountCall::Photo {
                    destination: dest.clone(),
                    size: 3,
                    caption: Some("look".into())
                },
                AccountCall::Text {
                    destination: dest,
                    text: "plain".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn unknown_or_disconnected_account_is_transport_error() {
        let offline = Arc::new(MockAccount::disconnected("offline"));
        let pool = pool_of(&[offline.clone()]);
        let dest = ChatTarget::Id(1);

        let err = pool.copy(0, &dest, 2, 3).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
        let err = pool.send(7, &dest, Some("x"), None).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert_eq!(offline.call_count(), 0, "client must not be called");
    }

    #[tokio::test]
    async fn counts_and_names() {
        let pool = pool_of(&[
            Arc::new(MockAccount::new("alpha")),
            Arc::new(MockAccount::disconnected("beta")),
        ]);
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.connected_count(), 1);
        assert!(pool.is_connected(0));
        assert!(!pool.is_connected(1));
        assert!(!pool.is_connected(9));
        assert_eq!(pool.name(1), "beta");
        assert!(matches!(
            pool.get(2),
            Err(HeraldError::UnknownAccount { index: 2, count: 2 })
        ));
    }

    #[tokio::test]
    async fn connect_all_fails_on_first_bad_account() {
        let good = Arc::new(MockAccount::disconnected("good"));
        let bad = Arc::new(MockAccount::failing_connect("bad"));
        let pool = pool_of(&[good.clone(), bad]);

        let err = pool.connect_all().await.unwrap_err();
        assert!(err.to_string().contains("bad"));
        assert!(good.is_connected());
    }

    #[tokio::test]
    async fn shutdown_all_reaches_every_account() {
        let a = Arc::new(MockAccount::new("a"));
        let b = Arc::new(MockAccount::new("b"));
        let pool = pool_of(&[a.clone(), b.clone()]);
        pool.shutdown_all().await;
        assert!(a.is_shut_down() && b.is_shut_down());
        assert_eq!(pool.connected_count(), 0);
    }
}
