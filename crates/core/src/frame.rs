// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound message chunking.
//!
//! Messages are written as a sequence of bounded frames so one large message
//! never holds the socket for longer than a single frame write. The first
//! frame carries the text opcode, every following frame the continuation
//! opcode, and only the last frame is final.

use crate::error::{Error, Result};

/// Default maximum frame payload in bytes.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Opcode of an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// First frame of a text message.
    Text,
    /// Any frame after the first.
    Continuation,
}

/// One bounded chunk of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameChunk<'a> {
    pub kind: FrameKind,
    pub payload: &'a [u8],
    pub is_final: bool,
}

/// Splits `data` into frames of at most `max_size` payload bytes.
///
/// An empty message still produces one (empty, final) text frame.
pub fn split_frames(data: &[u8], max_size: usize) -> Result<Vec<FrameChunk<'_>>> {
    if max_size == 0 {
        return Err(Error::InvalidFrameSize);
    }
    if data.is_empty() {
        return Ok(vec![FrameChunk {
            kind: FrameKind::Text,
            payload: data,
            is_final: true,
        }]);
    }

    let count = data.len().div_ceil(max_size);
    Ok(data
        .chunks(max_size)
        .enumerate()
        .map(|(i, payload)| FrameChunk {
            kind: if i == 0 {
                FrameKind::Text
            } else {
                FrameKind::Continuation
            },
            payload,
            is_final: i + 1 == count,
        })
        .collect())
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
