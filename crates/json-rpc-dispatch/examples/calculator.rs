//! Calculator JSON-RPC Example
//!
//! Registers a few arithmetic methods and feeds single requests, a
//! notification and a batch through the dispatcher. Run with
//! `RUST_LOG=debug` to see the dispatch lifecycle.

use async_trait::async_trait;
use json_rpc_dispatch::prelude::*;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Divides by a fixed divisor taken from the invocation context
struct ScaledDivide;

struct Divisor(f64);

#[async_trait]
impl MethodHandler for ScaledDivide {
    async fn call(&self, args: BoundArgs, context: InvocationContext<'_>) -> HandlerResult {
        let value = args.value::<f64>(0)?;
        let divisor = context
            .downcast_ref::<Divisor>()
            .ok_or_else(|| HandlerError::msg("Missing divisor context"))?;
        if divisor.0 == 0.0 {
            return Err(HandlerError::msg("Division by zero"));
        }
        Ok(json!(value / divisor.0))
    }
}

fn operands() -> Vec<ParamSpec> {
    vec![
        ParamSpec::typed("a", ParamType::Number),
        ParamSpec::typed("b", ParamType::Number),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut dispatcher =
        JsonRpcDispatcher::with_config(DispatcherConfig::default().with_max_batch_size(16));
    dispatcher.add_sync_fn("add", operands(), |args| {
        Ok(json!(args.value::<f64>(0)? + args.value::<f64>(1)?))
    })?;
    dispatcher.add_sync_fn("subtract", operands(), |args| {
        Ok(json!(args.value::<f64>(0)? - args.value::<f64>(1)?))
    })?;
    dispatcher.add_fn("log", vec![ParamSpec::new("message")], |args| async move {
        tracing::info!(text = ?args.get(0), "log notification");
        Ok(Value::Null)
    })?;
    dispatcher.registry_mut().add_method_with_context(
        "tenth",
        ScaledDivide,
        vec![ParamSpec::typed("value", ParamType::Number)],
        Divisor(10.0),
    )?;

    let inputs = vec![
        json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 5, "b": 3}, "id": 1}),
        json!({"jsonrpc": "2.0", "method": "subtract", "params": [10, 4], "id": 2}),
        json!({"jsonrpc": "2.0", "method": "multiply", "params": [2, 3], "id": 3}),
        json!({"jsonrpc": "2.0", "method": "add", "params": {"a": "invalid", "b": 5}, "id": 4}),
        json!({"jsonrpc": "2.0", "method": "log", "params": ["hello"]}),
        json!([
            {"jsonrpc": "2.0", "method": "tenth", "params": [42], "id": "batch-1"},
            {"jsonrpc": "2.0", "method": "log", "params": {"message": "in a batch"}},
            {"jsonrpc": "2.0", "method": "add", "params": [1, 1], "id": "batch-2"}
        ]),
    ];

    for (i, input) in inputs.iter().enumerate() {
        println!("\n--- Test {} ---", i + 1);
        println!("Request: {}", input);

        match dispatcher.handle(input).await? {
            Some(output) => println!("Response: {}", serde_json::to_string_pretty(&output)?),
            None => println!("(notification, no response)"),
        }
    }

    println!("\nRegistered methods: {:?}", dispatcher.registry().method_names());
    Ok(())
}
