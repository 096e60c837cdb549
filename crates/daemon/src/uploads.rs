// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Upload pipeline: queue, worker registry and the worker loop.
//!
//! Items are claimed from the shared queue by a fixed pool of workers. Each
//! worker owns one slot in the [`WorkerRegistry`] and is the only writer of
//! it; listing and snapshotting only read the slots.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uplink_core::UploadItem;

use crate::device::DeviceState;
use crate::queue::{CancelSet, WorkQueue};
use crate::store::{compose_snapshot, StoreResult, UploadQueueStore};

/// Result of one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The server accepted the upload.
    Completed,
    /// A fault worth retrying; counts against the retry cap.
    Retry(String),
    /// The transfer was stopped by policy; retried without penalty.
    Abort,
    /// The upload can never succeed; it is dropped.
    Rejected(String),
}

/// Called with `(sent, total)` bytes as a transfer proceeds. Returning
/// false aborts the transfer.
pub type ProgressHook = Arc<dyn Fn(u64, u64) -> bool + Send + Sync>;

/// Performs the transfer of one upload item.
pub trait Uploader: Send + Sync {
    fn upload(
        &self,
        item: &UploadItem,
        progress: ProgressHook,
    ) -> Pin<Box<dyn Future<Output = TransferOutcome> + Send + '_>>;
}

/// The item a single worker is processing.
#[derive(Debug, Default)]
pub struct WorkerSlot {
    current: Mutex<Option<UploadItem>>,
}

impl WorkerSlot {
    fn lock(&self) -> MutexGuard<'_, Option<UploadItem>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, item: UploadItem) {
        *self.lock() = Some(item);
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn get(&self) -> Option<UploadItem> {
        self.lock().clone()
    }

    /// Records transfer progress on the held item.
    pub fn update_progress(&self, sent: u64, total: u64) {
        let mut current = self.lock();
        if let Some(item) = current.as_ref() {
            *current = Some(item.with_progress(sent, total));
        }
    }
}

/// One slot per upload worker.
#[derive(Debug)]
pub struct WorkerRegistry {
    slots: Vec<Arc<WorkerSlot>>,
}

impl WorkerRegistry {
    pub fn new(workers: usize) -> Self {
        WorkerRegistry {
            slots: (0..workers).map(|_| Arc::new(WorkerSlot::default())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<Arc<WorkerSlot>> {
        self.slots.get(index).cloned()
    }

    /// Empties every slot.
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.clear();
        }
    }

    /// Items currently held by workers, in slot order.
    pub fn in_flight(&self) -> Vec<UploadItem> {
        self.slots.iter().filter_map(|slot| slot.get()).collect()
    }
}

/// Timing of the upload workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerTiming {
    /// Bound on each wait for the next item.
    pub poll: Duration,
    /// Pause after a retry.
    pub retry_delay: Duration,
}

/// Process-lifetime upload state shared by all sessions.
pub struct UploadManager {
    queue: WorkQueue<UploadItem>,
    cancelled: CancelSet,
    registry: WorkerRegistry,
    store: UploadQueueStore,
    /// Held across compose and save so snapshots land in order.
    persist_lock: Mutex<()>,
    max_retry_count: u32,
}

impl UploadManager {
    pub fn new(store: UploadQueueStore, workers: usize, max_retry_count: u32) -> Self {
        UploadManager {
            queue: WorkQueue::new(),
            cancelled: CancelSet::new(),
            registry: WorkerRegistry::new(workers),
            store,
            persist_lock: Mutex::new(()),
            max_retry_count,
        }
    }

    pub fn queue(&self) -> &WorkQueue<UploadItem> {
        &self.queue
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn cancelled(&self) -> &CancelSet {
        &self.cancelled
    }

    /// Loads the snapshot into the queue. Returns the number restored.
    pub fn restore(&self) -> StoreResult<usize> {
        let items = self.store.load()?;
        let count = items.len();
        for item in items {
            self.queue.push(item);
        }
        Ok(count)
    }

    /// Queues an item, assigning its content id.
    pub fn enqueue(&self, item: UploadItem) -> UploadItem {
        let item = item.identified();
        self.queue.push(item.clone());
        item
    }

    /// Marks ids for cancellation and drops them from the snapshot.
    pub fn cancel<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.cancelled.insert(id);
        }
        self.persist();
    }

    /// In-flight items followed by queued items, without cancelled ones.
    pub fn pending(&self) -> Vec<UploadItem> {
        compose_snapshot(
            self.registry.in_flight(),
            self.queue.snapshot(),
            |id| self.cancelled.contains(id),
        )
    }

    /// Writes the snapshot, logging failures.
    pub fn persist(&self) {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.store.save(&self.pending()) {
            warn!(error = %e, "failed to save upload queue");
        }
    }

    /// Runs upload worker `index` until `token` is cancelled.
    pub async fn run_worker(
        &self,
        index: usize,
        uploader: &dyn Uploader,
        device: Arc<dyn DeviceState>,
        token: &CancellationToken,
        timing: WorkerTiming,
    ) {
        let Some(slot) = self.registry.slot(index) else {
            warn!(index, "no registry slot for upload worker");
            return;
        };

        while !token.is_cancelled() {
            slot.clear();
            let Some(item) = self.queue.pop_timeout(timing.poll).await else {
                continue;
            };
            let item = item.claimed();
            slot.set(item.clone());

            if item.is_cancelled_by(|id| self.cancelled.take(id)) {
                info!(path = %item.path, "upload cancelled");
                slot.clear();
                self.persist();
                continue;
            }

            if device.is_metered() && !item.allow_cellular {
                debug!(path = %item.path, "metered network, deferring upload");
                self.retry(&slot, false, token, timing.retry_delay).await;
                continue;
            }

            info!(path = %item.path, retry_count = item.retry_count, "upload start");
            let progress = progress_hook(&slot, &item, Arc::clone(&device), token.clone());
            let outcome = tokio::select! {
                outcome = uploader.upload(&item, progress) => outcome,
                _ = token.cancelled() => TransferOutcome::Abort,
            };
            match outcome {
                TransferOutcome::Completed => {
                    info!(path = %item.path, "upload success");
                    slot.clear();
                    self.persist();
                }
                TransferOutcome::Rejected(reason) => {
                    warn!(path = %item.path, %reason, "upload rejected");
                    slot.clear();
                    self.persist();
                }
                TransferOutcome::Retry(reason) => {
                    warn!(path = %item.path, %reason, "upload retry");
                    self.retry(&slot, true, token, timing.retry_delay).await;
                }
                TransferOutcome::Abort => {
                    info!(path = %item.path, "upload aborted");
                    self.retry(&slot, false, token, timing.retry_delay).await;
                }
            }
        }
        slot.clear();
    }

    /// Requeues the slot's item if it has retries left, then pauses.
    async fn retry(
        &self,
        slot: &WorkerSlot,
        penalize: bool,
        token: &CancellationToken,
        delay: Duration,
    ) {
        let Some(item) = slot.get() else {
            return;
        };
        slot.clear();

        if item.retry_count >= self.max_retry_count {
            warn!(path = %item.path, retry_count = item.retry_count, "retry limit reached, dropping upload");
            self.persist();
            return;
        }

        self.queue.push(item.recycled(penalize));
        self.persist();

        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn progress_hook(
    slot: &Arc<WorkerSlot>,
    item: &UploadItem,
    device: Arc<dyn DeviceState>,
    token: CancellationToken,
) -> ProgressHook {
    let slot = Arc::clone(slot);
    let allow_cellular = item.allow_cellular;
    Arc::new(move |sent, total| {
        if device.is_metered() && !allow_cellular {
            return false;
        }
        if token.is_cancelled() {
            return false;
        }
        slot.update_progress(sent, total);
        true
    })
}

#[cfg(test)]
#[path = "uploads_tests.rs"]
mod tests;
