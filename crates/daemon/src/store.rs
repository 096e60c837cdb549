// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Upload queue snapshot persistence.
//!
//! The pending uploads are written as a JSONL snapshot after every change in
//! the queue that matters across a restart. On startup the snapshot is read
//! back and fed into the queue.

use std::path::PathBuf;

use uplink_core::{jsonl, UploadItem};

/// Error type for snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the snapshot failed.
    #[error("snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: uplink_core::Error,
    },
}

/// Result type for snapshot operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// JSONL snapshot of the pending uploads.
#[derive(Debug, Clone)]
pub struct UploadQueueStore {
    path: PathBuf,
}

impl UploadQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        UploadQueueStore { path: path.into() }
    }

    /// Reads the snapshot, resetting per-attempt state of every item.
    ///
    /// Items written without an id get their content id.
    pub fn load(&self) -> StoreResult<Vec<UploadItem>> {
        let items: Vec<UploadItem> = jsonl::read_all(&self.path).map_err(|source| {
            StoreError::Snapshot {
                path: self.path.clone(),
                source,
            }
        })?;
        Ok(items
            .into_iter()
            .map(|item| {
                let item = item.restored();
                if item.id.is_some() {
                    item
                } else {
                    item.identified()
                }
            })
            .collect())
    }

    /// Replaces the snapshot with `items`.
    pub fn save(&self, items: &[UploadItem]) -> StoreResult<()> {
        jsonl::write_all(&self.path, items).map_err(|source| StoreError::Snapshot {
            path: self.path.clone(),
            source,
        })
    }
}

/// Builds the snapshot contents: in-flight items first, then queued items,
/// leaving out anything `is_cancelled` names.
pub fn compose_snapshot(
    in_flight: Vec<UploadItem>,
    queued: Vec<UploadItem>,
    is_cancelled: impl Fn(&str) -> bool,
) -> Vec<UploadItem> {
    in_flight
        .into_iter()
        .chain(queued)
        .filter(|item| !item.is_cancelled_by(&is_cancelled))
        .collect()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
