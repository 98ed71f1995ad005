// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single dispatch worker.
//!
//! Exactly one task is in the `Sending` state at any time. Each task walks
//! `WaitingForTask -> SelectingAccount -> Delaying -> Sending ->
//! (Retrying | Completed | Failed)` and is marked done exactly once.
//!
//! On cancellation the worker stops before the next wait or send. A send
//! already in flight runs to completion. Tasks still queued are marked
//! failed so the queue's completion count stays exact.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use herald_core::{MessageRef, RelayTask, SendError, TaskContent};

use crate::delay::DelayModel;
use crate::pool::AccountPool;
use crate::queue::DispatchQueue;
use crate::selector::Selector;

/// Observable worker state, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WorkerState {
    WaitingForTask,
    SelectingAccount,
    Delaying,
    Sending,
    Retrying,
    Completed,
    Failed,
    Stopped,
}

/// Counters for finished tasks.
#[derive(Debug, Default)]
pub struct DispatchStats {
    completed: AtomicU64,
    failed: AtomicU64,
    rate_limited: AtomicU64,
}

/// A point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub rate_limited: u64,
}

impl StatsSnapshot {
    /// Tasks that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

/// Why a task did not complete.
#[derive(Debug)]
enum Failure {
    Selection(herald_core::HeraldError),
    Send(SendError),
    Cancelled,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Selection(e) => write!(f, "{e}"),
            Failure::Send(e) => write!(f, "{e}"),
            Failure::Cancelled => f.write_str("abandoned at shutdown"),
        }
    }
}

/// Consumes the dispatch queue one task at a time.
pub struct DispatchWorker {
    pool: Arc<AccountPool>,
    selector: Arc<Selector>,
    delay: Arc<DelayModel>,
    queue: Arc<DispatchQueue>,
    stats: Arc<DispatchStats>,
    state: watch::Sender<WorkerState>,
}

impl DispatchWorker {
    pub fn new(
        pool: Arc<AccountPool>,
        selector: Arc<Selector>,
        delay: Arc<DelayModel>,
        queue: Arc<DispatchQueue>,
        stats: Arc<DispatchStats>,
        state: watch::Sender<WorkerState>,
    ) -> Self {
        Self {
            pool,
            selector,
            delay,
            queue,
            stats,
            state,
        }
    }

    /// Runs until `cancel` fires or the queue's sender side is gone.
    pub async fn run(self, mut rx: UnboundedReceiver<RelayTask>, cancel: CancellationToken) {
        info!("dispatch worker running");

        loop {
            self.set_state(WorkerState::WaitingForTask);
            let task = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                task = rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };
            self.queue.mark_taken();

            let outcome = self.process(&task, &cancel).await;
            let completed = outcome.is_ok();
            self.finish(&task, outcome);

            if completed
                && let Some(rest) = self.delay.rest_after_send()
            {
                info!(rest_secs = rest.as_secs_f64(), "resting after send");
                if !sleep_or_cancel(rest, &cancel).await {
                    break;
                }
            }
        }

        rx.close();
        let mut abandoned = 0usize;
        while let Ok(task) = rx.try_recv() {
            self.queue.mark_taken();
            self.finish(&task, Err(Failure::Cancelled));
            abandoned += 1;
        }
        if abandoned > 0 {
            warn!(abandoned, "dispatch worker dropped queued tasks at shutdown");
        }

        self.set_state(WorkerState::Stopped);
        info!("dispatch worker stopped");
    }

    async fn process(
        &self,
        task: &RelayTask,
        cancel: &CancellationToken,
    ) -> Result<MessageRef, Failure> {
        self.set_state(WorkerState::SelectingAccount);
        let selected = match task.forced_account_index {
            Some(index) => index,
            None => self
                .selector
                .select(&task.destination)
                .map_err(Failure::Selection)?,
        };
        // Copied message ids only resolve for the account that observed them.
        let sender = match &task.content {
            TaskContent::Copy {
                source_account_index,
                ..
            } => *source_account_index,
            TaskContent::Inline { .. } => selected,
        };

        self.set_state(WorkerState::Delaying);
        let plan = self.delay.compute(self.queue.waiting());
        debug!(
            task_id = task.id,
            think_secs = plan.think.as_secs_f64(),
            interval_secs = plan.interval.as_secs_f64(),
            jitter_secs = plan.jitter.as_secs_f64(),
            batch_secs = plan.batch.as_secs_f64(),
            operation_secs = plan.operation.as_secs_f64(),
            "delay plan"
        );
        if !sleep_or_cancel(plan.pre_send(), cancel).await
            || !sleep_or_cancel(plan.operation, cancel).await
        {
            return Err(Failure::Cancelled);
        }

        self.set_state(WorkerState::Sending);
        info!(
            task_id = task.id,
            kind = task.content.kind(),
            destination = %task.destination,
            selected = %self.pool.name(selected),
            sender = %self.pool.name(sender),
            "sending"
        );
        match self.attempt(task, sender).await {
            Ok(sent) => Ok(sent),
            Err(SendError::RateLimited { retry_after }) => {
                self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "prometheus")]
                herald_prometheus::record_rate_limited(self.pool.name(sender));
                warn!(
                    task_id = task.id,
                    account = %self.pool.name(sender),
                    retry_after_secs = retry_after.as_secs_f64(),
                    "rate limited, retrying once"
                );

                self.set_state(WorkerState::Retrying);
                if !sleep_or_cancel(retry_after, cancel).await {
                    return Err(Failure::Cancelled);
                }
                self.set_state(WorkerState::Sending);
                self.attempt(task, sender).await.map_err(|e| {
                    if e.is_rate_limited() {
                        self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);
                    }
                    Failure::Send(e)
                })
            }
            Err(e) => Err(Failure::Send(e)),
        }
    }

    async fn attempt(&self, task: &RelayTask, account: usize) -> Result<MessageRef, SendError> {
        match &task.content {
            TaskContent::Copy {
                source_chat,
                source_message_id,
                ..
            } => {
                self.pool
                    .copy(account, &task.destination, *source_chat, *source_message_id)
                    .await
            }
            TaskContent::Inline { text, photo } => {
                self.pool
                    .send(account, &task.destination, text.as_deref(), photo.clone())
                    .await
            }
        }
    }

    fn finish(&self, task: &RelayTask, outcome: Result<MessageRef, Failure>) {
        let label = match outcome {
            Ok(sent) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                self.set_state(WorkerState::Completed);
                info!(
                    task_id = task.id,
                    destination = %task.destination,
                    message_id = sent.message_id,
                    "task completed"
                );
                "completed"
            }
            Err(failure) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.set_state(WorkerState::Failed);
                error!(
                    task_id = task.id,
                    destination = %task.destination,
                    error = %failure,
                    "task failed"
                );
                match failure {
                    Failure::Send(_) | Failure::Selection(_) => "failed",
                    Failure::Cancelled => "abandoned",
                }
            }
        };
        self.queue.task_done();
        debug!(task_id = task.id, outcome = label, remaining = self.queue.len(), "task finished");

        #[cfg(feature = "prometheus")]
        herald_prometheus::record_finished(label, self.queue.len());
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}

/// Sleeps for `duration` unless cancelled first. Returns `false` when
/// cancelled.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use herald_core::{AccountClient, ChatTarget};
    use herald_test_utils::{AccountCall, MockAccount};
    use tokio::time::Instant;

    use crate::delay::DelayParameters;
    use crate::selector::DistributionPolicy;

    struct Fixture {
        accounts: Vec<Arc<MockAccount>>,
        queue: Arc<DispatchQueue>,
        stats: Arc<DispatchStats>,
        state: watch::Receiver<WorkerState>,
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start(n: usize, policy: DistributionPolicy, params: DelayParameters) -> Fixture {
        let accounts: Vec<Arc<MockAccount>> = (0..n)
            .map(|i| Arc::new(MockAccount::new(format!("acct{i}"))))
            .collect();
        let pool = Arc::new(AccountPool::new(
            accounts
                .iter()
                .map(|a| a.clone() as Arc<dyn AccountClient>)
                .collect(),
        ));
        let queue = Arc::new(DispatchQueue::new());
        let stats = Arc::new(DispatchStats::default());
        let (state_tx, state) = watch::channel(WorkerState::WaitingForTask);
        let worker = DispatchWorker::new(
            pool,
            Arc::new(Selector::new(policy, n)),
            Arc::new(DelayModel::new(params).unwrap()),
            queue.clone(),
            stats.clone(),
            state_tx,
        );
        let rx = queue.take_receiver().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(rx, cancel.clone()));
        Fixture {
            accounts,
            queue,
            stats,
            state,
            cancel,
            handle,
        }
    }

    fn text(dest: i64, body: &str) -> RelayTask {
        RelayTask::inline(ChatTarget::Id(dest), Some(body.into()), None).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn round_robin_spreads_inline_tasks() {
        let fx = start(3, DistributionPolicy::RoundRobin, DelayParameters::zero());
        for i in 0..6 {
            fx.queue.enqueue(text(-1, &format!("m{i}"))).unwrap();
        }
        fx.queue.join().await;

        for account in &fx.accounts {
            assert_eq!(account.call_count(), 2);
        }
        assert_eq!(fx.stats.snapshot().completed, 6);
        fx.cancel.cancel();
        fx.handle.await.unwrap();
        assert_eq!(*fx.state.borrow(), WorkerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn copy_uses_observing_account() {
        let fx = start(3, DistributionPolicy::FixedFirst, DelayParameters::zero());
        fx.queue
            .enqueue(RelayTask::copy(ChatTarget::Id(-9), -5, 77, 2))
            .unwrap();
        fx.queue.join().await;

        assert_eq!(fx.accounts[0].call_count(), 0);
        assert_eq!(
            fx.accounts[2].calls(),
            vec![AccountCall::Copy {
                destination: ChatTarget::Id(-9),
                source_chat: -5,
                source_message_id: 77
            }]
        );
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_copy_is_not_resent_as_plain_text() {
        let fx = start(2, DistributionPolicy::FixedFirst, DelayParameters::zero());
        fx.accounts[1].push_error(SendError::NotMember {
            reason: "CHAT_WRITE_FORBIDDEN".into(),
        });
        fx.queue
            .enqueue(RelayTask::copy(ChatTarget::Id(-9), -5, 77, 1))
            .unwrap();
        fx.queue.join().await;

        assert_eq!(fx.accounts[1].call_count(), 1);
        assert_eq!(fx.accounts[0].call_count(), 0);
        assert_eq!(fx.stats.snapshot().failed, 1);
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn forced_account_overrides_policy() {
        let fx = start(3, DistributionPolicy::RoundRobin, DelayParameters::zero());
        fx.queue
            .enqueue(
                RelayTask::inline(ChatTarget::Id(1), None, Some(Bytes::from_static(b"p")))
                    .unwrap()
                    .with_forced_account(1),
            )
            .unwrap();
        fx.queue.join().await;
        assert_eq!(fx.accounts[1].call_count(), 1);
        assert_eq!(fx.accounts[0].call_count(), 0);
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_retries_once_after_exact_wait() {
        let fx = start(1, DistributionPolicy::RoundRobin, DelayParameters::zero());
        fx.accounts[0].push_error(SendError::RateLimited {
            retry_after: Duration::from_secs(5),
        });
        fx.queue.enqueue(text(1, "hello")).unwrap();
        fx.queue.join().await;

        let times = fx.accounts[0].call_times();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1] - times[0], Duration::from_secs(5));
        let stats = fx.stats.snapshot();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.rate_limited, 1);
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn second_failure_is_terminal_and_worker_moves_on() {
        let fx = start(1, DistributionPolicy::RoundRobin, DelayParameters::zero());
        fx.accounts[0].push_error(SendError::RateLimited {
            retry_after: Duration::from_secs(5),
        });
        fx.accounts[0].push_error(SendError::RateLimited {
            retry_after: Duration::from_secs(5),
        });
        fx.queue.enqueue(text(1, "first")).unwrap();
        fx.queue.enqueue(text(1, "second")).unwrap();
        fx.queue.join().await;

        assert_eq!(fx.accounts[0].call_count(), 3);
        let stats = fx.stats.snapshot();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.rate_limited, 2);
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_on_retry_fails_the_task() {
        let fx = start(1, DistributionPolicy::RoundRobin, DelayParameters::zero());
        fx.accounts[0].push_error(SendError::RateLimited {
            retry_after: Duration::from_secs(5),
        });
        fx.accounts[0].push_error(SendError::transport("connection reset"));
        let started = Instant::now();
        fx.queue.enqueue(text(-100123, "hello")).unwrap();
        fx.queue.join().await;

        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(fx.accounts[0].call_count(), 2);
        let stats = fx.stats.snapshot();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(*fx.state.borrow(), WorkerState::WaitingForTask);
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn not_member_is_dropped_without_retry() {
        let fx = start(1, DistributionPolicy::RoundRobin, DelayParameters::zero());
        fx.accounts[0].push_error(SendError::NotMember {
            reason: "CHAT_WRITE_FORBIDDEN".into(),
        });
        fx.queue.enqueue(text(1, "x")).unwrap();
        fx.queue.join().await;

        assert_eq!(fx.accounts[0].call_count(), 1);
        assert_eq!(fx.stats.snapshot().failed, 1);
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_waits_between_sends() {
        let params = DelayParameters {
            send_interval: 2.0,
            ..DelayParameters::zero()
        };
        let fx = start(1, DistributionPolicy::RoundRobin, params);
        let started = Instant::now();
        fx.queue.enqueue(text(1, "a")).unwrap();
        fx.queue.enqueue(text(1, "b")).unwrap();
        fx.queue.join().await;

        let times = fx.accounts[0].call_times();
        assert_eq!(times[0] - started, Duration::from_secs(2));
        assert_eq!(times[1] - times[0], Duration::from_secs(2));
        fx.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_waiting_tasks() {
        let params = DelayParameters {
            send_interval: 60.0,
            ..DelayParameters::zero()
        };
        let fx = start(1, DistributionPolicy::RoundRobin, params);
        for i in 0..3 {
            fx.queue.enqueue(text(1, &format!("m{i}"))).unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        fx.cancel.cancel();
        fx.handle.await.unwrap();

        assert_eq!(fx.accounts[0].call_count(), 0);
        let stats = fx.stats.snapshot();
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.finished(), 3);
        assert!(fx.queue.is_empty());
        assert_eq!(*fx.state.borrow(), WorkerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_fails_tasks_instead_of_panicking() {
        let fx = start(0, DistributionPolicy::RoundRobin, DelayParameters::zero());
        fx.queue.enqueue(text(1, "nobody")).unwrap();
        fx.queue.join().await;
        assert_eq!(fx.stats.snapshot().failed, 1);
        fx.cancel.cancel();
    }
}
