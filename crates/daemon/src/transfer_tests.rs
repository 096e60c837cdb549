// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use httpmock::prelude::*;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Mutex;
use tempfile::tempdir;
use yare::parameterized;

#[parameterized(
    ok = { 200, TransferOutcome::Completed },
    created = { 201, TransferOutcome::Completed },
    unauthorized = { 401, TransferOutcome::Rejected("status 401".into()) },
    forbidden = { 403, TransferOutcome::Rejected("status 403".into()) },
    precondition = { 412, TransferOutcome::Rejected("status 412".into()) },
    server_error = { 500, TransferOutcome::Retry("status 500".into()) },
    not_found = { 404, TransferOutcome::Retry("status 404".into()) },
)]
fn status_maps_to_outcome(status: u16, expected: TransferOutcome) {
    assert_eq!(status_outcome(status), expected);
}

#[test]
fn resolve_prefers_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rlog.bz2");
    std::fs::write(&path, b"x").unwrap();
    std::fs::write(dir.path().join("rlog"), b"y").unwrap();

    assert_eq!(resolve_source(&path), UploadSource::Plain(path));
}

#[test]
fn resolve_falls_back_to_uncompressed_sibling() {
    let dir = tempdir().unwrap();
    let sibling = dir.path().join("rlog");
    std::fs::write(&sibling, b"y").unwrap();

    let source = resolve_source(&dir.path().join("rlog.bz2"));
    assert_eq!(source, UploadSource::Compress(sibling));
}

#[test]
fn resolve_missing_without_extension_stays_plain() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing");
    assert_eq!(resolve_source(&path), UploadSource::Plain(path));
}

#[test]
fn compress_produces_bzip2() {
    let data = b"hello hello hello hello".repeat(100);
    let compressed = compress(&data).unwrap();
    assert!(compressed.starts_with(b"BZh"));

    let mut decoded = Vec::new();
    bzip2::read::BzDecoder::new(compressed.as_slice())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, data);
}

fn item_for(path: &Path, url: String) -> UploadItem {
    let mut headers = BTreeMap::new();
    headers.insert("x-ms-blob-type".to_string(), "BlockBlob".to_string());
    UploadItem::new(path.to_string_lossy(), url, headers, false, 1).identified()
}

fn always(progress: Arc<Mutex<Vec<(u64, u64)>>>) -> ProgressHook {
    Arc::new(move |sent, total| {
        progress.lock().unwrap().push((sent, total));
        true
    })
}

#[tokio::test]
async fn put_sends_file_with_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qlog");
    std::fs::write(&path, b"payload bytes").unwrap();
    let server = MockServer::start_async().await;
    let blob = server.mock(|when, then| {
        when.method(PUT)
            .path("/blob/qlog")
            .header("content-length", "13")
            .header("x-ms-blob-type", "BlockBlob")
            .body("payload bytes");
        then.status(201);
    });

    let reports = Arc::new(Mutex::new(Vec::new()));
    let uploader = HttpUploader::new(Duration::from_secs(5));
    let outcome = uploader
        .upload(&item_for(&path, server.url("/blob/qlog")), always(Arc::clone(&reports)))
        .await;
    assert_eq!(outcome, TransferOutcome::Completed);
    blob.assert();
    assert_eq!(reports.lock().unwrap().last(), Some(&(13, 13)));
}

#[tokio::test]
async fn put_compresses_missing_bz2() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("rlog"), b"raw log").unwrap();
    let compressed_len = compress(b"raw log").unwrap().len().to_string();
    let server = MockServer::start_async().await;
    let blob = server.mock(|when, then| {
        when.method(PUT)
            .path("/blob/rlog.bz2")
            .header("content-length", compressed_len.as_str());
        then.status(200);
    });

    let uploader = HttpUploader::new(Duration::from_secs(5));
    let item = item_for(&dir.path().join("rlog.bz2"), server.url("/blob/rlog.bz2"));
    let outcome = uploader
        .upload(&item, always(Arc::new(Mutex::new(Vec::new()))))
        .await;
    assert_eq!(outcome, TransferOutcome::Completed);
    blob.assert();
}

#[tokio::test]
async fn server_error_is_retried() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qlog");
    std::fs::write(&path, b"x").unwrap();
    let server = MockServer::start_async().await;
    let blob = server.mock(|when, then| {
        when.method(PUT).path("/b");
        then.status(503);
    });

    let uploader = HttpUploader::new(Duration::from_secs(5));
    let outcome = uploader
        .upload(&item_for(&path, server.url("/b")), always(Arc::new(Mutex::new(Vec::new()))))
        .await;
    assert_eq!(outcome, TransferOutcome::Retry("status 503".into()));
    blob.assert();
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let dir = tempdir().unwrap();
    let uploader = HttpUploader::new(Duration::from_secs(5));
    let item = item_for(&dir.path().join("gone"), "http://127.0.0.1:9/b".to_string());

    let outcome = uploader
        .upload(&item, always(Arc::new(Mutex::new(Vec::new()))))
        .await;
    assert!(matches!(outcome, TransferOutcome::Rejected(_)));
}

#[tokio::test]
async fn refused_connection_is_retried() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qlog");
    std::fs::write(&path, b"x").unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let uploader = HttpUploader::new(Duration::from_secs(5));
    let outcome = uploader
        .upload(
            &item_for(&path, format!("http://{addr}/b")),
            always(Arc::new(Mutex::new(Vec::new()))),
        )
        .await;
    assert!(matches!(outcome, TransferOutcome::Retry(_)));
}

#[tokio::test]
async fn hook_refusal_aborts_before_sending() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qlog");
    std::fs::write(&path, b"x").unwrap();

    let uploader = HttpUploader::new(Duration::from_secs(5));
    let outcome = uploader
        .upload(
            &item_for(&path, "http://127.0.0.1:9/b".to_string()),
            Arc::new(|_, _| false),
        )
        .await;
    assert_eq!(outcome, TransferOutcome::Abort);
}
