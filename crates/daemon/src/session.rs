// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! State shared by the roles of one connection lifetime.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::queue::{OutboundQueues, WorkQueue};

/// One session: its queues, its liveness clock and its termination token.
///
/// Everything here lives exactly as long as one connection. A new session
/// starts with empty queues.
#[derive(Debug)]
pub struct Session {
    token: CancellationToken,
    /// Raw inbound messages awaiting dispatch.
    pub inbound: WorkQueue<String>,
    /// Messages awaiting the writer.
    pub outbound: OutboundQueues,
    /// Inbound JSON-RPC responses awaiting correlation.
    pub responses: WorkQueue<Value>,
    last_alive: Mutex<Instant>,
}

impl Session {
    /// Creates a session terminated by `token`.
    pub fn new(token: CancellationToken) -> Self {
        Session {
            token,
            inbound: WorkQueue::new(),
            outbound: OutboundQueues::new(),
            responses: WorkQueue::new(),
            last_alive: Mutex::new(Instant::now()),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Ends the session; every role observes this.
    pub fn terminate(&self) {
        self.token.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Records a liveness signal from the peer.
    pub fn touch(&self) {
        *self.last_alive.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last liveness signal.
    pub fn silent_for(&self) -> Duration {
        self.last_alive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
