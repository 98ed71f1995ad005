// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suppression of events observed by several accounts at once.
//!
//! When N pooled accounts sit in the same chat, each one sees the same
//! message. The first observer to mark its fingerprint wins; the others
//! are dropped. Entries expire after the retention horizon.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use herald_core::ObservedEvent;

/// Characters of trimmed text that feed the content hash.
const HASHED_TEXT_CHARS: usize = 200;

/// Hex characters of the SHA-256 digest kept in a fingerprint.
const HASH_HEX_LEN: usize = 16;

/// Identity of one logical message across observers:
/// `{chat}_{sender}_{YYYYmmddHHMMSS}_{content}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds a fingerprint from its parts.
    ///
    /// `content` hashes the first 200 characters of the trimmed text, or
    /// `media_<tag>` when there is no text; it is `0` when neither exists.
    pub fn new(
        chat_id: i64,
        sender_id: u64,
        event_time: DateTime<Utc>,
        text: Option<&str>,
        media_tag: Option<&str>,
    ) -> Self {
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        let content = match (text, media_tag) {
            (Some(text), _) => {
                let head: String = text.chars().take(HASHED_TEXT_CHARS).collect();
                short_hash(&head)
            }
            (None, Some(tag)) => short_hash(&format!("media_{tag}")),
            (None, None) => "0".to_string(),
        };
        Self(format!(
            "{chat_id}_{sender_id}_{}_{content}",
            event_time.format("%Y%m%d%H%M%S")
        ))
    }

    /// Fingerprint of an observed event. Events without a sender use id 0.
    pub fn of_event(event: &ObservedEvent) -> Self {
        Self::new(
            event.chat_id,
            event.sender.as_ref().map_or(0, |s| s.id),
            event.event_time,
            event.text.as_deref(),
            event.media_tag.as_deref(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_HEX_LEN);
    hex
}

/// Concurrent fingerprint table with time-based retention.
#[derive(Debug)]
pub struct DedupEngine {
    seen: DashMap<Fingerprint, Instant>,
    retention: Duration,
}

impl DedupEngine {
    pub fn new(retention: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            retention,
        }
    }

    /// Records `fingerprint` if it is new.
    ///
    /// Returns `true` for the first caller and `false` for every later one.
    /// The check and the insert happen under one shard lock.
    pub fn try_mark(&self, fingerprint: Fingerprint) -> bool {
        match self.seen.entry(fingerprint) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drops entries older than the retention horizon. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.seen.len();
        self.seen
            .retain(|_, marked| now.saturating_duration_since(*marked) < self.retention);
        before.saturating_sub(self.seen.len())
    }

    /// Runs [`sweep`](Self::sweep) every `interval` until `cancel` fires.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        info!(removed, remaining = self.len(), "dedup sweep removed expired fingerprints");
                    } else {
                        debug!(remaining = self.len(), "dedup sweep found nothing to remove");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("dedup sweeper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn at(secs: u32, nanos: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, secs).unwrap()
            + chrono::Duration::nanoseconds(nanos as i64)
    }

    #[test]
    fn fingerprint_layout() {
        let fp = Fingerprint::new(-100, 42, at(7, 0), None, None);
        assert_eq!(fp.as_str(), "-100_42_20260304050607_0");

        let text = Fingerprint::new(-100, 42, at(7, 0), Some("hello"), None);
        let parts: Vec<&str> = text.as_str().split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[3].len(), 16);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_ignores_subsecond_and_surrounding_whitespace() {
        let a = Fingerprint::new(1, 2, at(7, 0), Some("  same text "), None);
        let b = Fingerprint::new(1, 2, at(7, 999_000_000), Some("same text"), None);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_only_hashes_first_200_chars() {
        let base = "x".repeat(200);
        let a = Fingerprint::new(1, 2, at(7, 0), Some(&format!("{base}tail-a")), None);
        let b = Fingerprint::new(1, 2, at(7, 0), Some(&format!("{base}tail-b")), None);
        assert_eq!(a, b);
        let c = Fingerprint::new(1, 2, at(7, 0), Some("y"), None);
        assert_ne!(a, c);
    }

    #[test]
    fn media_without_text_hashes_the_tag() {
        let photo = Fingerprint::new(1, 2, at(7, 0), None, Some("photo"));
        let video = Fingerprint::new(1, 2, at(7, 0), None, Some("video"));
        let blank = Fingerprint::new(1, 2, at(7, 0), Some("   "), Some("photo"));
        assert_ne!(photo, video);
        assert_eq!(photo, blank);
        assert!(!photo.as_str().ends_with("_0"));
    }

    #[test]
    fn different_seconds_differ() {
        let a = Fingerprint::new(1, 2, at(7, 0), Some("t"), None);
        let b = Fingerprint::new(1, 2, at(8, 0), Some("t"), None);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn try_mark_is_idempotent() {
        let dedup = DedupEngine::new(Duration::from_secs(1800));
        let fp = Fingerprint::new(1, 2, at(7, 0), Some("t"), None);
        assert!(dedup.try_mark(fp.clone()));
        assert!(!dedup.try_mark(fp.clone()));
        assert!(!dedup.try_mark(fp.clone()));
        assert!(dedup.contains(&fp));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn concurrent_marks_have_one_winner() {
        const THREADS: usize = 8;
        let dedup = DedupEngine::new(Duration::from_secs(1800));

        for round in 0..64 {
            let fp = Fingerprint::new(1, 2, at(7, 0), Some(&format!("race {round}")), None);
            let barrier = Barrier::new(THREADS);
            let winners = AtomicUsize::new(0);
            std::thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        barrier.wait();
                        if dedup.try_mark(fp.clone()) {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });
            assert_eq!(winners.into_inner(), 1, "round {round}");
        }
        assert_eq!(dedup.len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_expires_only_old_entries() {
        let dedup = DedupEngine::new(Duration::from_secs(1800));
        let old = Fingerprint::new(1, 2, at(7, 0), Some("old"), None);
        let fresh = Fingerprint::new(1, 2, at(7, 0), Some("fresh"), None);

        assert!(dedup.try_mark(old.clone()));
        tokio::time::advance(Duration::from_secs(1000)).await;
        assert!(dedup.try_mark(fresh.clone()));
        tokio::time::advance(Duration::from_secs(801)).await;

        assert_eq!(dedup.sweep(), 1);
        assert!(!dedup.contains(&old));
        assert!(dedup.contains(&fresh));
        // An expired fingerprint is new again.
        assert!(dedup.try_mark(old));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval_and_stops_on_cancel() {
        let dedup = Arc::new(DedupEngine::new(Duration::from_secs(10)));
        dedup.try_mark(Fingerprint::new(1, 2, at(7, 0), Some("a"), None));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            dedup
                .clone()
                .run_sweeper(Duration::from_secs(30), cancel.clone()),
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(dedup.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
