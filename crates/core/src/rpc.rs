// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 messages exchanged over the command channel.
//!
//! The channel is symmetric:
//! - The server calls methods on the device (requests in, responses out)
//! - The device calls methods on the server (e.g. `forwardLogs`) and the
//!   server's responses come back in on the same channel

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON is not a valid request or response.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// A handler failed.
pub const SERVER_ERROR: i64 = -32000;

/// A method call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    /// Positional (array) or named (object) parameters.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    /// Absent for notifications, which get no response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// The error member of a failed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Either the result or the error of a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    Result(Value),
    Error(RpcErrorObject),
}

/// The reply to a method call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub body: ResponseBody,
    pub id: Value,
}

/// An inbound message, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Has a `method`: a call to dispatch.
    Request(RpcRequest),
    /// Has an `id` plus `result` or `error`: a reply to one of our calls.
    Response(Value),
    /// Valid JSON that is neither.
    Invalid(String),
    /// Not JSON at all.
    Malformed(String),
}

impl RpcRequest {
    /// Creates a request expecting a response.
    pub fn new(method: impl Into<String>, params: Value, id: impl Into<Value>) -> Self {
        RpcRequest {
            jsonrpc: default_version(),
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Serializes the request to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl RpcResponse {
    /// Creates a successful response.
    pub fn result(id: Value, result: Value) -> Self {
        RpcResponse {
            jsonrpc: default_version(),
            body: ResponseBody::Result(result),
            id,
        }
    }

    /// Creates an error response.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        RpcResponse {
            jsonrpc: default_version(),
            body: ResponseBody::Error(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Serializes the response to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Inbound {
    /// Classifies a raw inbound text message.
    pub fn classify(text: &str) -> Inbound {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => return Inbound::Malformed(e.to_string()),
        };
        let Some(object) = value.as_object() else {
            return Inbound::Invalid("not a valid request or response".to_string());
        };

        if object.contains_key("method") {
            return match serde_json::from_value(value) {
                Ok(request) => Inbound::Request(request),
                Err(e) => Inbound::Invalid(format!("invalid request: {e}")),
            };
        }
        if object.contains_key("id")
            && (object.contains_key("result") || object.contains_key("error"))
        {
            return Inbound::Response(value);
        }
        Inbound::Invalid("not a valid request or response".to_string())
    }
}

/// The id of an inbound response, as a string.
pub fn response_id(response: &Value) -> Option<String> {
    match response.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// True if the response carries a result whose `success` member is truthy.
pub fn response_success(response: &Value) -> bool {
    match response.get("result").and_then(|r| r.get("success")) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
