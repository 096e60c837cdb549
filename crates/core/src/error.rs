// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for uplink-core operations.

use thiserror::Error;

/// All possible errors that can occur in uplink-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid upload file name: '{0}'\n  hint: names must be relative and must not contain '..'")]
    InvalidFileName(String),

    #[error("invalid upload url for '{0}': url must not be empty")]
    EmptyUrl(String),

    #[error("frame size must be greater than zero")]
    InvalidFrameSize,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for uplink-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
