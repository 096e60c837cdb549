// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;
use crate::transport::TransportError;

/// Errors surfaced by the agent outside of a single role's loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("another uplinkd instance holds {0}")]
    AlreadyRunning(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("upload queue store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] uplink_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
