// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC dispatch.
//!
//! Inbound text is classified into calls, replies and garbage. Calls are
//! resolved in an immutable [`Registry`] built once per session; their
//! responses go out on the high-priority tier. Replies to our own requests
//! are handed to the log forwarder through the session's response queue.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use uplink_core::rpc::{INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR};
use uplink_core::{Inbound, RpcResponse};

use crate::session::Session;

/// Error returned by a method handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Failed(String),
}

impl RpcError {
    /// The JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => INVALID_PARAMS,
            RpcError::Failed(_) => SERVER_ERROR,
        }
    }
}

/// Result type for method handlers.
pub type RpcResult<T> = Result<T, RpcError>;

/// Future returned by a method handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = RpcResult<Value>> + Send>>;

/// A registered method.
pub type Handler = Arc<dyn Fn(Params) -> HandlerFuture + Send + Sync>;

/// Call parameters, given by position or by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Value);

impl Params {
    pub fn new(value: Value) -> Self {
        Params(value)
    }

    /// The argument at `index` of a positional call, or `name` of a named one.
    pub fn arg(&self, index: usize, name: &str) -> Option<&Value> {
        match &self.0 {
            Value::Array(items) => items.get(index),
            Value::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    /// A required argument, decoded.
    pub fn required<T: DeserializeOwned>(&self, index: usize, name: &str) -> RpcResult<T> {
        let value = self
            .arg(index, name)
            .ok_or_else(|| RpcError::InvalidParams(format!("missing argument '{name}'")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| RpcError::InvalidParams(format!("argument '{name}': {e}")))
    }

    /// An optional argument, decoded; null counts as absent.
    pub fn optional<T: DeserializeOwned>(&self, index: usize, name: &str) -> RpcResult<Option<T>> {
        match self.arg(index, name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| RpcError::InvalidParams(format!("argument '{name}': {e}"))),
        }
    }
}

/// Builds a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, Handler>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any earlier one.
    pub fn method<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Value>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params| Box::pin(handler(params)));
        self.handlers.insert(name.to_string(), handler);
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            handlers: self.handlers,
        }
    }
}

/// Method table of one session.
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invokes `method`.
    pub async fn call(&self, method: &str, params: Params) -> RpcResult<Value> {
        let handler = self
            .handlers
            .get(method)
            .ok_or_else(|| RpcError::MethodNotFound(method.to_string()))?;
        handler(params).await
    }
}

/// What to do with one inbound message.
#[derive(Debug, PartialEq)]
pub enum Dispatched {
    /// Send this response to the server.
    Reply(RpcResponse),
    /// A reply to one of our requests.
    Response(Value),
    /// A notification was handled; nothing to send.
    Nothing,
}

/// Handles one inbound text message.
pub async fn dispatch(registry: &Registry, text: &str) -> Dispatched {
    match Inbound::classify(text) {
        Inbound::Request(request) => {
            debug!(method = %request.method, "call method");
            let result = registry
                .call(&request.method, Params::new(request.params))
                .await;
            let Some(id) = request.id else {
                if let Err(e) = result {
                    debug!(method = %request.method, error = %e, "notification failed");
                }
                return Dispatched::Nothing;
            };
            match result {
                Ok(value) => Dispatched::Reply(RpcResponse::result(id, value)),
                Err(e) => {
                    warn!(method = %request.method, error = %e, "method failed");
                    Dispatched::Reply(RpcResponse::error(id, e.code(), e.to_string()))
                }
            }
        }
        Inbound::Response(value) => Dispatched::Response(value),
        Inbound::Invalid(reason) => {
            warn!(%reason, "invalid inbound message");
            Dispatched::Reply(RpcResponse::error(Value::Null, INVALID_REQUEST, "Invalid Request"))
        }
        Inbound::Malformed(reason) => {
            warn!(%reason, "malformed inbound message");
            Dispatched::Reply(RpcResponse::error(Value::Null, PARSE_ERROR, "Parse error"))
        }
    }
}

/// Dispatcher role: drains the inbound queue until the session ends.
pub async fn run_dispatcher(registry: Arc<Registry>, session: &Session, poll: Duration) {
    while !session.is_terminated() {
        let next = tokio::select! {
            _ = session.token().cancelled() => break,
            next = session.inbound.pop_timeout(poll) => next,
        };
        let Some(text) = next else {
            continue;
        };
        match dispatch(&registry, &text).await {
            Dispatched::Reply(response) => match response.to_json() {
                Ok(json) => session.outbound.high.push(json),
                Err(e) => warn!(error = %e, "failed to encode response"),
            },
            Dispatched::Response(value) => session.responses.push(value),
            Dispatched::Nothing => {}
        }
    }
    debug!("dispatcher stopped");
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
