// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transfer of upload items.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use tracing::debug;
use uplink_core::upload::strip_compressed_extension;
use uplink_core::UploadItem;

use crate::uploads::{ProgressHook, TransferOutcome, Uploader};

/// Body chunk size; progress is reported once per chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Maps an HTTP status to the outcome of the attempt.
pub fn status_outcome(status: u16) -> TransferOutcome {
    match status {
        200 | 201 => TransferOutcome::Completed,
        401 | 403 | 412 => TransferOutcome::Rejected(format!("status {status}")),
        other => TransferOutcome::Retry(format!("status {other}")),
    }
}

/// Where the bytes of an upload come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// The file as named.
    Plain(PathBuf),
    /// The uncompressed sibling, compressed on the fly.
    Compress(PathBuf),
}

/// Picks the source for `path`: the file itself, or its uncompressed
/// sibling when only that exists.
pub fn resolve_source(path: &Path) -> UploadSource {
    if !path.exists() {
        let name = path.to_string_lossy();
        let stripped = strip_compressed_extension(&name);
        if stripped.len() != name.len() {
            let sibling = PathBuf::from(stripped);
            if sibling.exists() {
                return UploadSource::Compress(sibling);
            }
        }
    }
    UploadSource::Plain(path.to_path_buf())
}

/// bzip2-compresses `data`.
pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

async fn read_source(source: UploadSource) -> std::io::Result<Vec<u8>> {
    match source {
        UploadSource::Plain(path) => tokio::fs::read(path).await,
        UploadSource::Compress(path) => {
            let raw = tokio::fs::read(&path).await?;
            debug!(path = %path.display(), "compressing upload");
            tokio::task::spawn_blocking(move || compress(&raw))
                .await
                .map_err(std::io::Error::other)?
        }
    }
}

/// Uploads items with a single streaming HTTP PUT.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpUploader {
    pub fn new(timeout: Duration) -> Self {
        HttpUploader {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn transfer(&self, item: &UploadItem, progress: ProgressHook) -> TransferOutcome {
        let content = match read_source(resolve_source(Path::new(&item.path))).await {
            Ok(content) => Bytes::from(content),
            Err(e) => return TransferOutcome::Rejected(format!("{}: {}", item.path, e)),
        };
        let total = content.len() as u64;
        if !progress(0, total) {
            return TransferOutcome::Abort;
        }

        let aborted = Arc::new(AtomicBool::new(false));
        let body = progress_stream(content, progress, Arc::clone(&aborted));

        let mut request = self
            .client
            .put(&item.url)
            .timeout(self.timeout)
            .body(reqwest::Body::wrap_stream(body));
        for (name, value) in &item.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.header(CONTENT_LENGTH, total.to_string());

        match request.send().await {
            Ok(response) => status_outcome(response.status().as_u16()),
            Err(_) if aborted.load(Ordering::SeqCst) => TransferOutcome::Abort,
            Err(e) => TransferOutcome::Retry(e.to_string()),
        }
    }
}

impl Uploader for HttpUploader {
    fn upload(
        &self,
        item: &UploadItem,
        progress: ProgressHook,
    ) -> Pin<Box<dyn Future<Output = TransferOutcome> + Send + '_>> {
        let item = item.clone();
        Box::pin(async move { self.transfer(&item, progress).await })
    }
}

/// Splits `content` into chunks, consulting `progress` before each one.
fn progress_stream(
    content: Bytes,
    progress: ProgressHook,
    aborted: Arc<AtomicBool>,
) -> impl futures_util::Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let total = content.len() as u64;
    let chunks: Vec<Bytes> = (0..content.len())
        .step_by(CHUNK_SIZE)
        .map(|start| content.slice(start..(start + CHUNK_SIZE).min(content.len())))
        .collect();

    let mut sent = 0u64;
    futures_util::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        if progress(sent, total) {
            Ok(chunk)
        } else {
            aborted.store(true, Ordering::SeqCst);
            Err(std::io::Error::other("transfer aborted"))
        }
    })
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
