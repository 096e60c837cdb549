// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Device state flags consulted by the upload and keepalive roles.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Flag file set while the device is in active use.
pub const ACTIVE_FLAG: &str = "IsOnroad";
/// Flag file set while the network connection is metered.
pub const METERED_FLAG: &str = "NetworkMetered";

/// Read-only view of device conditions.
pub trait DeviceState: Send + Sync {
    /// True while the network is metered (e.g. cellular).
    fn is_metered(&self) -> bool;

    /// True while the device is in active use.
    fn is_active(&self) -> bool;
}

/// Device state held in memory.
#[derive(Debug, Default)]
pub struct StaticDeviceState {
    metered: AtomicBool,
    active: AtomicBool,
}

impl StaticDeviceState {
    pub fn new(metered: bool, active: bool) -> Self {
        StaticDeviceState {
            metered: AtomicBool::new(metered),
            active: AtomicBool::new(active),
        }
    }

    pub fn set_metered(&self, metered: bool) {
        self.metered.store(metered, Ordering::SeqCst);
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl DeviceState for StaticDeviceState {
    fn is_metered(&self) -> bool {
        self.metered.load(Ordering::SeqCst)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Device state read from flag files in a params directory.
///
/// A flag is set when its file exists and contains `1`.
#[derive(Debug, Clone)]
pub struct ParamsDeviceState {
    dir: PathBuf,
}

impl ParamsDeviceState {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ParamsDeviceState { dir: dir.into() }
    }

    fn flag(&self, name: &str) -> bool {
        std::fs::read_to_string(self.dir.join(name))
            .map(|content| content.trim() == "1")
            .unwrap_or(false)
    }
}

impl DeviceState for ParamsDeviceState {
    fn is_metered(&self) -> bool {
        self.flag(METERED_FLAG)
    }

    fn is_active(&self) -> bool {
        self.flag(ACTIVE_FLAG)
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
