// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! uplink-core: Shared library for the uplink device agent
//!
//! This crate provides the transport-agnostic data model and primitives used
//! by the uplinkd agent: upload items and their identities, JSON-RPC message
//! shapes, outbound frame chunking, reconnect backoff and JSON Lines storage.

pub mod backoff;
pub mod error;
pub mod frame;
pub mod jsonl;
pub mod rpc;
pub mod upload;

pub use backoff::backoff_secs;
pub use error::{Error, Result};
pub use frame::{split_frames, FrameChunk, FrameKind};
pub use rpc::{Inbound, RpcErrorObject, RpcRequest, RpcResponse};
pub use upload::{UploadFile, UploadItem};
