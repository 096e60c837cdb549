// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use yare::parameterized;

fn registry() -> Registry {
    Registry::builder()
        .method("echo", |params: Params| async move {
            params.required::<Value>(0, "s")
        })
        .method("fail", |_params: Params| async move {
            Err::<Value, _>(RpcError::Failed("boom".to_string()))
        })
        .build()
}

fn reply(dispatched: Dispatched) -> Value {
    match dispatched {
        Dispatched::Reply(response) => serde_json::to_value(response).unwrap(),
        other => panic!("expected a reply, got {other:?}"),
    }
}

#[parameterized(
    positional = { json!(["hi", 2]), Some(json!("hi")), Some(json!(2)) },
    named = { json!({"s": "hi", "n": 2}), Some(json!("hi")), Some(json!(2)) },
    empty = { Value::Null, None, None },
)]
fn params_lookup(value: Value, first: Option<Value>, second: Option<Value>) {
    let params = Params::new(value);
    assert_eq!(params.arg(0, "s").cloned(), first);
    assert_eq!(params.arg(1, "n").cloned(), second);
}

#[test]
fn params_required_and_optional() {
    let params = Params::new(json!({"port": 8022, "flag": null}));
    assert_eq!(params.required::<u16>(0, "port").unwrap(), 8022);
    assert_eq!(params.optional::<bool>(1, "flag").unwrap(), None);
    assert_eq!(params.optional::<bool>(2, "other").unwrap(), None);

    let err = params.required::<String>(3, "missing").unwrap_err();
    assert_eq!(err.code(), INVALID_PARAMS);
    let err = params.required::<String>(0, "port").unwrap_err();
    assert!(matches!(err, RpcError::InvalidParams(_)));
}

#[test]
fn registry_lists_methods() {
    assert_eq!(registry().methods(), vec!["echo", "fail"]);
}

#[tokio::test]
async fn echo_returns_argument() {
    let text = r#"{"jsonrpc":"2.0","method":"echo","params":["hello"],"id":1}"#;
    let response = reply(dispatch(&registry(), text).await);
    assert_eq!(response, json!({"jsonrpc": "2.0", "result": "hello", "id": 1}));
}

#[tokio::test]
async fn echo_named_params() {
    let text = r#"{"jsonrpc":"2.0","method":"echo","params":{"s":"hello"},"id":"a"}"#;
    let response = reply(dispatch(&registry(), text).await);
    assert_eq!(response["result"], "hello");
    assert_eq!(response["id"], "a");
}

#[parameterized(
    unknown_method = { r#"{"jsonrpc":"2.0","method":"nope","id":1}"#, -32601, json!(1) },
    bad_params = { r#"{"jsonrpc":"2.0","method":"echo","params":[],"id":2}"#, -32602, json!(2) },
    handler_error = { r#"{"jsonrpc":"2.0","method":"fail","id":3}"#, -32000, json!(3) },
    invalid_request = { r#"{"jsonrpc":"2.0","id":4}"#, -32600, Value::Null },
    not_an_object = { r#"[1,2,3]"#, -32600, Value::Null },
    parse_error = { r#"{"jsonrpc":"#, -32700, Value::Null },
)]
fn error_responses(text: &str, code: i64, id: Value) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let response = reply(rt.block_on(dispatch(&registry(), text)));
    assert_eq!(response["error"]["code"], code);
    assert_eq!(response["id"], id);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn handler_error_carries_message() {
    let text = r#"{"jsonrpc":"2.0","method":"fail","id":3}"#;
    let response = reply(dispatch(&registry(), text).await);
    assert_eq!(response["error"]["message"], "boom");
}

#[tokio::test]
async fn notification_gets_no_reply() {
    let text = r#"{"jsonrpc":"2.0","method":"echo","params":["x"]}"#;
    assert_eq!(dispatch(&registry(), text).await, Dispatched::Nothing);
}

#[tokio::test]
async fn responses_are_routed() {
    let text = r#"{"jsonrpc":"2.0","result":{"success":1},"id":"log-1"}"#;
    match dispatch(&registry(), text).await {
        Dispatched::Response(value) => assert_eq!(value["id"], "log-1"),
        other => panic!("expected a response, got {other:?}"),
    }
}

#[tokio::test]
async fn dispatcher_role_routes_to_queues() {
    let token = CancellationToken::new();
    let session = Session::new(token.clone());
    session
        .inbound
        .push(r#"{"jsonrpc":"2.0","method":"echo","params":["x"],"id":9}"#.to_string());
    session
        .inbound
        .push(r#"{"jsonrpc":"2.0","error":{"code":1,"message":"no"},"id":"log"}"#.to_string());

    let registry = Arc::new(registry());
    let role = run_dispatcher(registry, &session, Duration::from_millis(10));
    let stopper = async {
        while !session.inbound.is_empty() || session.responses.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    };
    tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(role, stopper) })
        .await
        .unwrap();

    let sent: Value = serde_json::from_str(&session.outbound.high.try_pop().unwrap()).unwrap();
    assert_eq!(sent["result"], "x");
    assert_eq!(session.responses.try_pop().unwrap()["id"], "log");
    assert!(session.outbound.low.is_empty());
}
