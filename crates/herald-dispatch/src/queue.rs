// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unbounded FIFO of relay tasks with completion accounting.
//!
//! `pending` counts tasks enqueued but not yet marked done, so it covers the
//! task the worker is currently handling. [`DispatchQueue::join`] waits for
//! it to reach zero. `waiting` only counts tasks the worker has not taken
//! yet.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tracing::debug;

use herald_core::{HeraldError, RelayTask};

#[derive(Debug)]
pub struct DispatchQueue {
    tx: UnboundedSender<RelayTask>,
    rx: Mutex<Option<UnboundedReceiver<RelayTask>>>,
    pending: AtomicUsize,
    waiting: AtomicUsize,
    next_id: AtomicU64,
    closed: AtomicBool,
    drained: Notify,
}

impl DispatchQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            pending: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            drained: Notify::new(),
        }
    }

    /// Appends a task and returns how many tasks now wait for the worker.
    /// Never blocks.
    ///
    /// The task is assigned the next sequence id.
    pub fn enqueue(&self, mut task: RelayTask) -> Result<usize, HeraldError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HeraldError::QueueClosed);
        }
        task.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task_id = task.id;
        self.pending.fetch_add(1, Ordering::AcqRel);
        let depth = self.waiting.fetch_add(1, Ordering::AcqRel) + 1;
        if self.tx.send(task).is_err() {
            self.mark_taken();
            self.task_done();
            return Err(HeraldError::QueueClosed);
        }
        debug!(task_id, depth, "task enqueued");
        Ok(depth)
    }

    /// Tasks enqueued and not yet marked done.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks not yet taken by the worker. Excludes the one in flight.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    /// Called by the consumer for every task it receives.
    pub fn mark_taken(&self) {
        let _ = self
            .waiting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Marks one task as finished, successfully or not.
    pub fn task_done(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.drained.notify_waiters();
        }
    }

    /// Resolves once every enqueued task has been marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Rejects further enqueues. Tasks already queued stay queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Hands the consuming end to the worker. Only the first call gets it.
    pub fn take_receiver(&self) -> Option<UnboundedReceiver<RelayTask>> {
        self.rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
