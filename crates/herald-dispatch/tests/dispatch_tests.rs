// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end dispatch scenarios over mock accounts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use herald_core::{ChatTarget, EventSender, ObservedEvent, RelayTask, SendError};
use herald_dispatch::{DistributionPolicy, Fingerprint, IngressDecision, IngressSettings};
use herald_test_utils::{AccountCall, TestHarness};
use tokio::sync::Barrier;

fn text_task(dest: i64, body: &str) -> RelayTask {
    RelayTask::inline(ChatTarget::Id(dest), Some(body.into()), None).unwrap()
}

fn observed(account_index: usize) -> ObservedEvent {
    ObservedEvent {
        account_index,
        sender: Some(EventSender {
            id: 4242,
            handle: Some("signal_bot".into()),
            is_bot: true,
        }),
        chat_id: -1001,
        message_id: 88,
        text: Some("BTC long 65000".into()),
        media_tag: None,
        event_time: Utc::now() + chrono::Duration::seconds(5),
    }
}

fn watching() -> IngressSettings {
    IngressSettings {
        target_handle: Some("signal_bot".into()),
        destination: None,
        ignore_history: true,
    }
}

/// Three accounts see the same message; only the first observer relays it.
#[tokio::test]
async fn duplicate_observations_relay_once() {
    let harness = TestHarness::builder().with_accounts(3).build().unwrap();
    let filter = harness.filter(watching());

    let decisions: Vec<IngressDecision> = [2, 0, 1]
        .into_iter()
        .map(|i| filter.handle(&observed(i)).unwrap())
        .collect();
    assert_eq!(decisions[0], IngressDecision::Enqueued { depth: 1 });
    assert_eq!(decisions[1], IngressDecision::Duplicate);
    assert_eq!(decisions[2], IngressDecision::Duplicate);

    harness.settle().await;
    assert_eq!(harness.total_calls(), 1);
    assert_eq!(
        harness.account(2).calls(),
        vec![AccountCall::Copy {
            destination: ChatTarget::Id(-1001),
            source_chat: -1001,
            source_message_id: 88,
        }]
    );
    harness.engine.shutdown().await;
}

/// Observers racing on separate runtime threads still relay once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_observers_relay_once() {
    const OBSERVERS: usize = 4;
    let harness = TestHarness::builder()
        .with_accounts(OBSERVERS)
        .build()
        .unwrap();
    let filter = Arc::new(harness.filter(watching()));
    let barrier = Arc::new(Barrier::new(OBSERVERS));

    let handles: Vec<_> = (0..OBSERVERS)
        .map(|i| {
            let filter = filter.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                filter.handle(&observed(i)).unwrap()
            })
        })
        .collect();
    let mut decisions = Vec::new();
    for handle in handles {
        decisions.push(handle.await.unwrap());
    }

    let enqueued = decisions
        .iter()
        .filter(|d| matches!(d, IngressDecision::Enqueued { .. }))
        .count();
    let duplicates = decisions
        .iter()
        .filter(|d| **d == IngressDecision::Duplicate)
        .count();
    assert_eq!(enqueued, 1);
    assert_eq!(duplicates, OBSERVERS - 1);

    harness.settle().await;
    assert_eq!(harness.total_calls(), 1);
    harness.engine.shutdown().await;
}

/// A rate limit is waited out exactly once; a second one drops the task.
#[tokio::test(start_paused = true)]
async fn rate_limit_retry_then_drop() {
    let harness = TestHarness::builder().with_accounts(1).build().unwrap();
    let account = harness.account(0);
    for _ in 0..2 {
        account.push_error(SendError::RateLimited {
            retry_after: Duration::from_secs(5),
        });
    }

    harness.engine.enqueue(text_task(1, "doomed")).unwrap();
    harness.engine.enqueue(text_task(1, "next")).unwrap();
    harness.settle().await;

    let times = account.call_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], Duration::from_secs(5));
    assert_eq!(times[2], times[1], "worker moves on without waiting");

    let stats = harness.engine.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    harness.engine.shutdown().await;
}

/// Every task finishes exactly once, whatever its outcome.
#[tokio::test(start_paused = true)]
async fn every_task_finishes_exactly_once() {
    let harness = TestHarness::builder()
        .with_accounts(2)
        .with_policy(DistributionPolicy::RoundRobin)
        .build()
        .unwrap();
    harness.account(0).push_error(SendError::NotMember {
        reason: "kicked".into(),
    });
    harness.account(1).push_error(SendError::transport("connection reset"));
    harness.account(0).push_error(SendError::RateLimited {
        retry_after: Duration::from_secs(3),
    });

    for i in 0..40 {
        harness.engine.enqueue(text_task(-5, &format!("m{i}"))).unwrap();
    }
    harness.settle().await;

    let stats = harness.engine.stats();
    assert_eq!(stats.finished(), 40);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.rate_limited, 1);
    assert!(harness.engine.queue().is_empty());
    harness.engine.shutdown().await;
}

/// Two full cycles give every account exactly two sends per destination.
#[tokio::test]
async fn round_robin_two_cycles() {
    let n = 4;
    let harness = TestHarness::builder()
        .with_accounts(n)
        .with_policy(DistributionPolicy::RoundRobin)
        .build()
        .unwrap();
    for i in 0..2 * n {
        harness.engine.enqueue(text_task(-7, &format!("m{i}"))).unwrap();
    }
    harness.settle().await;

    for account in &harness.accounts {
        assert_eq!(account.call_count(), 2);
    }
    harness.engine.shutdown().await;
}

/// Random mode keeps per-destination usage within one of balanced.
#[tokio::test]
async fn random_mode_is_balanced_per_destination() {
    let harness = TestHarness::builder()
        .with_accounts(3)
        .with_policy(DistributionPolicy::Random)
        .build()
        .unwrap();
    for i in 0..10 {
        harness.engine.enqueue(text_task(-1, &format!("a{i}"))).unwrap();
        harness.engine.enqueue(text_task(-2, &format!("b{i}"))).unwrap();
    }
    harness.settle().await;

    for dest in [-1, -2] {
        let per_account: Vec<usize> = harness
            .accounts
            .iter()
            .map(|a| {
                a.calls()
                    .iter()
                    .filter(|c| *c.destination() == ChatTarget::Id(dest))
                    .count()
            })
            .collect();
        let max = per_account.iter().max().unwrap();
        let min = per_account.iter().min().unwrap();
        assert!(max - min <= 1, "unbalanced for {dest}: {per_account:?}");
    }
    harness.engine.shutdown().await;
}

/// The running sweeper forgets fingerprints after the retention horizon.
#[tokio::test(start_paused = true)]
async fn sweeper_forgets_old_fingerprints() {
    let harness = TestHarness::builder()
        .with_retention(Duration::from_secs(60))
        .with_sweep_interval(Duration::from_secs(30))
        .build()
        .unwrap();
    let dedup = harness.engine.dedup();
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let fp = Fingerprint::new(-1, 1, at, Some("x"), None);

    assert!(dedup.try_mark(fp.clone()));
    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(!dedup.try_mark(fp.clone()), "still retained after first sweep");

    tokio::time::sleep(Duration::from_secs(50)).await;
    assert!(!dedup.contains(&fp));
    assert!(dedup.try_mark(fp));
    harness.engine.shutdown().await;
}

/// Shutdown waits for queued work, then rejects new tasks.
#[tokio::test(start_paused = true)]
async fn shutdown_drains_queue() {
    let harness = TestHarness::builder()
        .with_accounts(2)
        .with_drain_timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    for i in 0..6 {
        harness.engine.enqueue(text_task(3, &format!("m{i}"))).unwrap();
    }
    harness.engine.shutdown().await;

    assert_eq!(harness.total_calls(), 6);
    assert_eq!(harness.engine.stats().completed, 6);
    assert!(harness.accounts.iter().all(|a| a.is_shut_down()));
    assert!(harness.engine.enqueue(text_task(3, "late")).is_err());
}
