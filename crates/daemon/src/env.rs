// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`names`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

/// Returns the value of `UPLINK_HOST` if set.
pub fn host() -> Option<String> {
    non_empty(names::UPLINK_HOST)
}

/// Returns the value of `UPLINK_DEVICE_ID` if set.
pub fn device_id() -> Option<String> {
    non_empty(names::UPLINK_DEVICE_ID)
}

/// Returns `UPLINK_HANDLER_WORKERS` parsed as a count.
///
/// Unparseable values are ignored.
pub fn handler_workers() -> Option<usize> {
    non_empty(names::UPLINK_HANDLER_WORKERS).and_then(|v| v.trim().parse().ok())
}

/// Returns the value of `UPLINK_TOKEN` if set.
pub fn token() -> Option<String> {
    non_empty(names::UPLINK_TOKEN)
}

/// Returns the value of `UPLINK_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(names::UPLINK_STATE_DIR).ok().map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(names::XDG_STATE_HOME).ok().map(PathBuf::from)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
