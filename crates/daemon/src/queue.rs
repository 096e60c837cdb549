// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory work queues shared between session roles.
//!
//! Every wait on a queue is bounded, so a role blocked on an empty queue
//! wakes up regularly and can notice that its session is shutting down.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

/// FIFO queue with a bounded asynchronous pop.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        WorkQueue {
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item and wakes one waiter.
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
        self.available.notify_one();
    }

    /// Pops the front item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Pops the front item, waiting at most `timeout` for one to arrive.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a push between the check
            // and the await is not missed.
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> WorkQueue<T> {
    /// Copies the queued items, front first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }
}

/// Outbound message tiers drained by the writer.
#[derive(Debug, Default)]
pub struct OutboundQueues {
    /// RPC responses.
    pub high: WorkQueue<String>,
    /// Log forwards and other unsolicited traffic.
    pub low: WorkQueue<String>,
}

impl OutboundQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next message to write: the high tier if anything is waiting there,
    /// otherwise a bounded wait on the low tier.
    pub async fn next(&self, timeout: Duration) -> Option<String> {
        if let Some(msg) = self.high.try_pop() {
            return Some(msg);
        }
        self.low.pop_timeout(timeout).await
    }
}

/// Upload ids marked for cancellation.
#[derive(Debug, Default)]
pub struct CancelSet {
    ids: Mutex<HashSet<String>>,
}

impl CancelSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, id: impl Into<String>) {
        self.lock().insert(id.into());
    }

    /// Removes `id`, returning true if it was present.
    pub fn take(&self, id: &str) -> bool {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
