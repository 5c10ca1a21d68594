//! End-to-end behavior of the dispatcher through the public API

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use json_rpc_dispatch::prelude::*;
use serde_json::{Value, json};

fn dispatcher() -> JsonRpcDispatcher {
    let mut dispatcher = JsonRpcDispatcher::new();
    dispatcher.add_sync_fn("test", vec![], |_| Ok(json!(42))).unwrap();
    dispatcher
        .add_sync_fn(
            "sum",
            vec![
                ParamSpec::typed("a", ParamType::Number),
                ParamSpec::typed("b", ParamType::Number),
            ],
            |args| Ok(json!(args.value::<i64>(0)? + args.value::<i64>(1)?)),
        )
        .unwrap();
    dispatcher
        .add_fn("sleep", vec![ParamSpec::typed("ms", ParamType::Number)], |args| async move {
            let ms = args.value::<u64>(0)?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, HandlerError>(json!(ms))
        })
        .unwrap();
    dispatcher
        .add_sync_fn("fail", vec![], |_| Err(HandlerError::msg("Houston, we have a problem!")))
        .unwrap();
    dispatcher
}

async fn dispatch(dispatcher: &JsonRpcDispatcher, input: Value) -> Option<Value> {
    dispatcher
        .handle(&input)
        .await
        .expect("dispatch should not fail")
        .map(|output| output.to_value())
}

#[tokio::test]
async fn single_request_success() {
    let output = dispatch(
        &dispatcher(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "test"}),
    )
    .await;
    assert_eq!(output, Some(json!({"jsonrpc": "2.0", "id": 1, "result": 42})));
}

#[tokio::test]
async fn handler_failure_becomes_application_error() {
    let output = dispatch(
        &dispatcher(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "fail"}),
    )
    .await;
    assert_eq!(
        output,
        Some(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": -1,
                "message": "Application error",
                "data": { "details": "Houston, we have a problem!" }
            }
        }))
    );
}

#[tokio::test]
async fn structured_handler_errors_pass_through() {
    let mut dispatcher = JsonRpcDispatcher::new();
    dispatcher
        .add_sync_fn("busy", vec![], |_| {
            Err(JsonRpcErrorObject::custom(-32001, "Busy", Some(json!({"retry": true}))).into())
        })
        .unwrap();

    let output = dispatch(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": "x", "method": "busy"}),
    )
    .await;
    assert_eq!(
        output,
        Some(json!({
            "jsonrpc": "2.0",
            "id": "x",
            "error": { "code": -32001, "message": "Busy", "data": { "retry": true } }
        }))
    );
}

#[tokio::test]
async fn invalid_value_yields_invalid_request_with_null_id() {
    let output = dispatch(&dispatcher(), json!(1)).await;
    assert_eq!(
        output,
        Some(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32600, "message": "Invalid request"}
        }))
    );
}

#[tokio::test]
async fn invalid_params_are_reported_before_the_handler_runs() {
    let dispatcher = dispatcher();

    let missing = dispatch(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 2, "method": "sum", "params": {"a": 1}}),
    )
    .await;
    assert_eq!(
        missing,
        Some(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {
                "code": -32602,
                "message": "Invalid params",
                "data": { "details": "Parameter 'b' is required." }
            }
        }))
    );

    let mistyped = dispatch(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 3, "method": "sum", "params": [1, "2"]}),
    )
    .await;
    assert_eq!(
        mistyped.unwrap()["error"]["data"]["details"],
        json!("Invalid type for parameter 'b': expected 'number' but received 'string'.")
    );
}

#[tokio::test]
async fn empty_batch_is_a_single_invalid_request() {
    let output = dispatch(&dispatcher(), json!([])).await;
    assert_eq!(
        output,
        Some(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32600, "message": "Invalid request"}
        }))
    );
}

#[tokio::test(start_paused = true)]
async fn batch_preserves_order_regardless_of_completion() {
    let output = dispatch(
        &dispatcher(),
        json!([
            {"jsonrpc": "2.0", "id": 1, "method": "sleep", "params": [50]},
            {"jsonrpc": "2.0", "method": "test"},
            {"jsonrpc": "2.0", "id": 2, "method": "sleep", "params": [5]},
            {"jsonrpc": "2.0", "method": "fail"},
            {"jsonrpc": "2.0", "id": 3, "method": "missing"},
            7
        ]),
    )
    .await;

    assert_eq!(
        output,
        Some(json!([
            {"jsonrpc": "2.0", "id": 1, "result": 50},
            {"jsonrpc": "2.0", "id": 2, "result": 5},
            {"jsonrpc": "2.0", "id": 3, "error": {"code": -32601, "message": "Method not found"}},
            {"jsonrpc": "2.0", "id": null, "error": {"code": -32600, "message": "Invalid request"}}
        ]))
    );
}

#[tokio::test(start_paused = true)]
async fn batch_items_run_concurrently() {
    let started = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = JsonRpcDispatcher::new();
    let counter = started.clone();
    dispatcher
        .add_fn("wait", vec![], move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, HandlerError>(json!(counter.load(Ordering::SeqCst)))
            }
        })
        .unwrap();

    let request = |id: i64| json!({"jsonrpc": "2.0", "id": id, "method": "wait"});
    let output = dispatch(&dispatcher, json!([request(1), request(2), request(3)])).await.unwrap();

    // Every handler observes all three started before any of them finishes.
    for response in output.as_array().unwrap() {
        assert_eq!(response["result"], json!(3));
    }
}

#[tokio::test(start_paused = true)]
async fn limited_batch_concurrency_keeps_order() {
    let mut dispatcher =
        JsonRpcDispatcher::with_config(DispatcherConfig::default().with_batch_concurrency(1));
    dispatcher
        .add_fn("sleep", vec![ParamSpec::new("ms")], |args| async move {
            let ms = args.value::<u64>(0)?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, HandlerError>(json!(ms))
        })
        .unwrap();

    let output = dispatch(
        &dispatcher,
        json!([
            {"jsonrpc": "2.0", "id": "slow", "method": "sleep", "params": [30]},
            {"jsonrpc": "2.0", "id": "fast", "method": "sleep", "params": {"ms": 1}}
        ]),
    )
    .await
    .unwrap();

    assert_eq!(output[0]["id"], json!("slow"));
    assert_eq!(output[1]["id"], json!("fast"));
    assert_eq!(output[1]["result"], json!(1));
}

#[tokio::test]
async fn batch_of_notifications_yields_empty_output() {
    let output = dispatch(
        &dispatcher(),
        json!([
            {"jsonrpc": "2.0", "method": "test"},
            {"jsonrpc": "2.0", "method": "fail"}
        ]),
    )
    .await;
    assert_eq!(output, Some(json!([])));
}

#[tokio::test]
async fn failing_notification_is_silent() {
    let output = dispatch(&dispatcher(), json!({"jsonrpc": "2.0", "method": "fail"})).await;
    assert_eq!(output, None);
}

#[tokio::test]
async fn panicking_handler_is_a_per_item_application_error() {
    let mut dispatcher = dispatcher();
    dispatcher.add_sync_fn("explode", vec![], |_| panic!("Network error")).unwrap();

    let output = dispatch(
        &dispatcher,
        json!([
            {"jsonrpc": "2.0", "id": 1, "method": "test"},
            {"jsonrpc": "2.0", "id": 2, "method": "explode"},
            {"jsonrpc": "2.0", "method": "explode"},
            {"jsonrpc": "2.0", "id": 3, "method": "test"}
        ]),
    )
    .await;

    assert_eq!(
        output,
        Some(json!([
            {"jsonrpc": "2.0", "id": 1, "result": 42},
            {
                "jsonrpc": "2.0",
                "id": 2,
                "error": {
                    "code": -1,
                    "message": "Application error",
                    "data": { "details": "Network error" }
                }
            },
            {"jsonrpc": "2.0", "id": 3, "result": 42}
        ]))
    );
}

#[tokio::test]
async fn panicking_notification_is_silent() {
    let mut dispatcher = dispatcher();
    dispatcher.add_sync_fn("explode", vec![], |_| panic!("Network error")).unwrap();

    let output = dispatch(&dispatcher, json!({"jsonrpc": "2.0", "method": "explode"})).await;
    assert_eq!(output, None);

    let output = dispatch(&dispatcher, json!([{"jsonrpc": "2.0", "method": "explode"}])).await;
    assert_eq!(output, Some(json!([])));
}

#[tokio::test]
async fn removed_methods_are_no_longer_found() {
    let mut dispatcher = dispatcher();
    dispatcher.remove_method("test");
    assert!(!dispatcher.has_method("test"));

    let output = dispatch(
        &dispatcher,
        json!({"jsonrpc": "2.0", "id": 1, "method": "test"}),
    )
    .await;
    assert_eq!(output.unwrap()["error"]["code"], json!(-32601));
}

#[test]
fn reserved_names_cannot_be_registered() {
    let mut dispatcher = JsonRpcDispatcher::new();
    let error = dispatcher.add_sync_fn("rpc.discover", vec![], |_| Ok(Value::Null)).unwrap_err();
    assert_eq!(error.to_string(), "Method names must not start with 'rpc.': rpc.discover");
}
