// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Upload request and queue item types.
//!
//! An [`UploadFile`] is what the backend asks for; an [`UploadItem`] is what
//! sits in the upload queue and the persisted snapshot. Field names on the
//! wire match the backend's existing contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Extension of files the backend expects compressed.
pub const COMPRESSED_EXTENSION: &str = ".bz2";

/// A file the backend requests to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    /// Path relative to the agent's upload root.
    #[serde(rename = "fn", default)]
    pub name: String,
    /// Destination URL (usually pre-signed).
    #[serde(default)]
    pub url: String,
    /// Headers sent with the transfer.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Whether the transfer may use a metered network.
    #[serde(default)]
    pub allow_cellular: bool,
}

impl UploadFile {
    /// Checks the request shape, independent of the file system.
    ///
    /// Rejects empty names, absolute names, any name containing `..` and empty
    /// URLs.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.starts_with('/') || self.name.contains("..") {
            return Err(Error::InvalidFileName(self.name.clone()));
        }
        if self.url.is_empty() {
            return Err(Error::EmptyUrl(self.name.clone()));
        }
        Ok(())
    }
}

/// One entry of the upload queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    /// Local path of the file to send.
    pub path: String,
    /// Destination URL.
    pub url: String,
    /// Caller-supplied headers.
    pub headers: BTreeMap<String, String>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Content-derived identity, assigned when first enqueued.
    pub id: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    /// True while a worker owns the item.
    #[serde(default)]
    pub current: bool,
    /// Transfer progress in `[0, 1]`.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub allow_cellular: bool,
}

/// The fields an upload id is derived from.
#[derive(Serialize)]
struct IdentityFields<'a> {
    path: &'a str,
    url: &'a str,
    headers: &'a BTreeMap<String, String>,
    allow_cellular: bool,
}

impl UploadItem {
    /// Creates a fresh, unidentified item.
    pub fn new(
        path: impl Into<String>,
        url: impl Into<String>,
        headers: BTreeMap<String, String>,
        allow_cellular: bool,
        created_at: i64,
    ) -> Self {
        UploadItem {
            path: path.into(),
            url: url.into(),
            headers,
            created_at,
            id: None,
            retry_count: 0,
            current: false,
            progress: 0.0,
            allow_cellular,
        }
    }

    /// Computes the content hash identifying this upload.
    ///
    /// Only `path`, `url`, `headers` and `allow_cellular` contribute, so two
    /// submissions of the same logical upload share an id.
    pub fn content_id(&self) -> String {
        let fields = IdentityFields {
            path: &self.path,
            url: &self.url,
            headers: &self.headers,
            allow_cellular: self.allow_cellular,
        };
        // Serializing borrowed strings and a BTreeMap cannot fail.
        let canonical = serde_json::to_vec(&fields).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }

    /// Returns the item with its content id assigned.
    pub fn identified(mut self) -> Self {
        self.id = Some(self.content_id());
        self
    }

    /// Returns true if `cancelled` names this item.
    pub fn is_cancelled_by(&self, cancelled: impl Fn(&str) -> bool) -> bool {
        self.id.as_deref().is_some_and(cancelled)
    }

    /// The item as a worker holds it.
    pub fn claimed(self) -> Self {
        UploadItem {
            current: true,
            ..self
        }
    }

    /// The item as it goes back on the queue.
    pub fn recycled(self, penalize: bool) -> Self {
        let retry_count = if penalize {
            self.retry_count + 1
        } else {
            self.retry_count
        };
        UploadItem {
            retry_count,
            current: false,
            progress: 0.0,
            ..self
        }
    }

    /// The item as restored from a snapshot after a restart.
    pub fn restored(self) -> Self {
        UploadItem {
            current: false,
            progress: 0.0,
            ..self
        }
    }

    /// The item with updated progress; `total == 0` counts as done.
    pub fn with_progress(&self, sent: u64, total: u64) -> Self {
        let progress = if total == 0 {
            1.0
        } else {
            (sent as f64 / total as f64).clamp(0.0, 1.0)
        };
        UploadItem {
            progress,
            ..self.clone()
        }
    }
}

/// Strips the compressed extension, if present.
pub fn strip_compressed_extension(name: &str) -> &str {
    name.strip_suffix(COMPRESSED_EXTENSION).unwrap_or(name)
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
