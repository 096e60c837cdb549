// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn classify_request_with_named_params() {
    let text = r#"{"jsonrpc":"2.0","method":"echo","params":{"s":"hi"},"id":1}"#;
    match Inbound::classify(text) {
        Inbound::Request(req) => {
            assert_eq!(req.method, "echo");
            assert_eq!(req.params, json!({"s": "hi"}));
            assert_eq!(req.id, Some(json!(1)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn classify_notification_has_no_id() {
    let text = r#"{"jsonrpc":"2.0","method":"echo","params":["hi"]}"#;
    match Inbound::classify(text) {
        Inbound::Request(req) => assert!(req.id.is_none()),
        other => panic!("unexpected {other:?}"),
    }
}

#[parameterized(
    result = { r#"{"jsonrpc":"2.0","result":{"success":1},"id":"log-1"}"# },
    error = { r#"{"jsonrpc":"2.0","error":{"code":-1,"message":"no"},"id":"log-1"}"# },
)]
fn classify_response(text: &str) {
    assert!(matches!(Inbound::classify(text), Inbound::Response(_)));
}

#[parameterized(
    id_only = { r#"{"id":1}"# },
    empty_object = { "{}" },
    array = { "[1,2,3]" },
    bad_method_type = { r#"{"method":5,"id":1}"# },
)]
fn classify_invalid(text: &str) {
    assert!(matches!(Inbound::classify(text), Inbound::Invalid(_)));
}

#[test]
fn classify_malformed() {
    assert!(matches!(Inbound::classify("{not json"), Inbound::Malformed(_)));
}

#[test]
fn result_response_json_format() {
    let resp = RpcResponse::result(json!(3), json!("hi"));
    let value: Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
    assert_eq!(value, json!({"jsonrpc": "2.0", "result": "hi", "id": 3}));
}

#[test]
fn null_result_is_serialized() {
    let resp = RpcResponse::result(json!(1), Value::Null);
    let value: Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
    assert_eq!(value.get("result"), Some(&Value::Null));
    assert!(value.get("error").is_none());
}

#[test]
fn error_response_json_format() {
    let resp = RpcResponse::error(Value::Null, METHOD_NOT_FOUND, "Method not found");
    assert!(matches!(resp.body, ResponseBody::Error(_)));
    let value: Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found"},
            "id": null
        })
    );
}

#[test]
fn response_roundtrip() {
    let resp = RpcResponse::error(json!("abc"), SERVER_ERROR, "boom");
    let parsed: RpcResponse = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
    assert_eq!(resp, parsed);
}

#[test]
fn request_json_format() {
    let req = RpcRequest::new("forwardLogs", json!({"logs": "x"}), "entry-1");
    let value: Value = serde_json::from_str(&req.to_json().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({"jsonrpc": "2.0", "method": "forwardLogs", "params": {"logs": "x"}, "id": "entry-1"})
    );
}

#[parameterized(
    string = { json!({"id": "entry-1"}), Some("entry-1") },
    number = { json!({"id": 7}), Some("7") },
    null = { json!({"id": null}), None },
    missing = { json!({}), None },
)]
fn extracts_response_id(response: Value, expected: Option<&str>) {
    assert_eq!(response_id(&response).as_deref(), expected);
}

#[parameterized(
    true_flag = { json!({"result": {"success": true}}), true },
    one = { json!({"result": {"success": 1}}), true },
    zero = { json!({"result": {"success": 0}}), false },
    missing_flag = { json!({"result": {}}), false },
    error = { json!({"error": {"code": 1, "message": "x"}}), false },
    scalar_result = { json!({"result": 5}), false },
)]
fn detects_success(response: Value, expected: bool) {
    assert_eq!(response_success(&response), expected);
}
