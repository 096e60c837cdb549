// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! RPC methods exposed to the server.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uplink_core::upload::strip_compressed_extension;
use uplink_core::{UploadFile, UploadItem};

use crate::agent::Agent;
use crate::dispatch::{Params, Registry, RpcError, RpcResult};
use crate::tunnel::{start_local_proxy, TunnelRequest};
use crate::uploads::UploadManager;

/// What a method handler may touch.
struct MethodContext {
    agent: Agent,
    /// Token of the session the registry belongs to.
    session: CancellationToken,
}

/// Builds the method table of one session.
pub fn session_registry(agent: &Agent, session: &CancellationToken) -> Registry {
    let ctx = Arc::new(MethodContext {
        agent: agent.clone(),
        session: session.clone(),
    });

    Registry::builder()
        .method("echo", |params: Params| async move { params.required::<Value>(0, "s") })
        .method("getVersion", |_params: Params| async move {
            Ok(json!({ "version": env!("CARGO_PKG_VERSION") }))
        })
        .method("uploadFileToUrl", bind(&ctx, upload_file_to_url))
        .method("uploadFilesToUrls", bind(&ctx, upload_files_to_urls))
        .method("cancelUpload", bind(&ctx, cancel_upload))
        .method("listUploadQueue", bind(&ctx, list_upload_queue))
        .method("startLocalProxy", bind(&ctx, local_proxy))
        .method("getPublicKey", bind(&ctx, public_key))
        .build()
}

fn bind<F, Fut>(ctx: &Arc<MethodContext>, method: F) -> impl Fn(Params) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<MethodContext>, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<Value>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    move |params| method(Arc::clone(&ctx), params)
}

fn to_value<T: Serialize>(value: &T) -> RpcResult<Value> {
    serde_json::to_value(value).map_err(|e| RpcError::Failed(e.to_string()))
}

/// Reply of the upload methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnqueueResponse {
    pub enqueued: usize,
    pub items: Vec<UploadItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// Validates and queues `files`, resolving names against `root`.
pub fn enqueue_files(uploads: &UploadManager, root: &Path, files: Vec<UploadFile>) -> EnqueueResponse {
    let mut items = Vec::new();
    let mut failed = Vec::new();

    for file in files {
        if let Err(e) = file.validate() {
            warn!(error = %e, "rejecting upload");
            failed.push(file.name);
            continue;
        }
        let path = root.join(&file.name).to_string_lossy().into_owned();
        if !Path::new(&path).exists() && !Path::new(strip_compressed_extension(&path)).exists()
        {
            warn!(name = %file.name, "rejecting upload of missing file");
            failed.push(file.name);
            continue;
        }

        let item = UploadItem::new(
            path,
            file.url,
            file.headers,
            file.allow_cellular,
            chrono::Utc::now().timestamp_millis(),
        );
        items.push(uploads.enqueue(item));
    }

    uploads.persist();
    info!(enqueued = items.len(), failed = failed.len(), "uploads requested");
    EnqueueResponse {
        enqueued: items.len(),
        items,
        failed,
    }
}

async fn upload_file_to_url(ctx: Arc<MethodContext>, params: Params) -> RpcResult<Value> {
    let file = UploadFile {
        name: params.required(0, "fn")?,
        url: params.required(1, "url")?,
        headers: params.optional(2, "headers")?.unwrap_or_default(),
        allow_cellular: false,
    };
    let response = enqueue_files(&ctx.agent.uploads, &ctx.agent.config.upload_root, vec![file]);
    to_value(&response)
}

async fn upload_files_to_urls(ctx: Arc<MethodContext>, params: Params) -> RpcResult<Value> {
    let files: Vec<UploadFile> = params.required(0, "files_data")?;
    let response = enqueue_files(&ctx.agent.uploads, &ctx.agent.config.upload_root, files);
    to_value(&response)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UploadIds {
    One(String),
    Many(Vec<String>),
}

async fn cancel_upload(ctx: Arc<MethodContext>, params: Params) -> RpcResult<Value> {
    let ids = match params.required::<UploadIds>(0, "upload_id")? {
        UploadIds::One(id) => vec![id],
        UploadIds::Many(ids) => ids,
    };
    info!(count = ids.len(), "cancelling uploads");
    ctx.agent.uploads.cancel(ids);
    Ok(json!({ "success": 1 }))
}

async fn list_upload_queue(ctx: Arc<MethodContext>, _params: Params) -> RpcResult<Value> {
    to_value(&ctx.agent.uploads.pending())
}

async fn local_proxy(ctx: Arc<MethodContext>, params: Params) -> RpcResult<Value> {
    let remote_ws_uri: String = params.required(0, "remote_ws_uri")?;
    let local_port: u16 = params.required(1, "local_port")?;
    let config = &ctx.agent.config;

    let request = TunnelRequest {
        remote_ws_uri: &remote_ws_uri,
        local_port,
        allowed_ports: &config.local_port_allowlist,
        connect_timeout: config.connect_timeout(),
    };
    start_local_proxy(request, ctx.agent.tokens.as_ref(), &ctx.session)
        .await
        .map_err(|e| RpcError::Failed(e.to_string()))?;
    Ok(json!({ "success": 1 }))
}

async fn public_key(ctx: Arc<MethodContext>, _params: Params) -> RpcResult<Value> {
    let Some(path) = &ctx.agent.config.public_key_path else {
        return Ok(Value::Null);
    };
    match tokio::fs::read_to_string(path).await {
        Ok(key) => Ok(Value::String(key)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "public key unavailable");
            Ok(Value::Null)
        }
    }
}

#[cfg(test)]
#[path = "methods_tests.rs"]
mod tests;
