// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for agent module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use uplink_core::UploadItem;

/// Create an identified upload item for `path`.
pub fn make_item(path: &str) -> UploadItem {
    UploadItem::new(path, format!("http://upload.test/{path}"), BTreeMap::new(), false, 1_700_000_000_000)
        .identified()
}

/// Uploader that completes every transfer immediately.
pub struct NullUploader;

impl crate::uploads::Uploader for NullUploader {
    fn upload(
        &self,
        _item: &UploadItem,
        _progress: crate::uploads::ProgressHook,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = crate::uploads::TransferOutcome> + Send + '_>>
    {
        Box::pin(async { crate::uploads::TransferOutcome::Completed })
    }
}

/// Agent with a static token, idle device and no log source.
pub fn test_agent(config: crate::config::AgentConfig, state_dir: &std::path::Path) -> crate::agent::Agent {
    use std::sync::Arc;

    let store = crate::store::UploadQueueStore::new(config.queue_path(state_dir));
    crate::agent::Agent::new(
        config,
        store,
        Arc::new(crate::auth::StaticToken::new("test-token")),
        Arc::new(crate::device::StaticDeviceState::new(false, false)),
        Arc::new(NullUploader),
        None,
    )
}
