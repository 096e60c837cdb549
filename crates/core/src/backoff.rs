// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Jittered exponential backoff for reconnect attempts.

use rand::Rng;

/// Upper bound of the backoff window, in seconds.
pub const MAX_BACKOFF_SECS: u64 = 128;

/// Exclusive upper bound of the backoff window after `retries` failures.
///
/// `min(128, 2^retries)`, never less than 1.
pub fn backoff_ceiling(retries: u32) -> u64 {
    if retries >= 7 {
        MAX_BACKOFF_SECS
    } else {
        1u64 << retries
    }
}

/// Picks a delay uniformly from `[0, backoff_ceiling(retries))` seconds.
pub fn backoff_secs_with<R: Rng + ?Sized>(retries: u32, rng: &mut R) -> u64 {
    rng.gen_range(0..backoff_ceiling(retries))
}

/// Picks a delay using the thread-local generator.
pub fn backoff_secs(retries: u32) -> u64 {
    backoff_secs_with(retries, &mut rand::thread_rng())
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
