use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, StreamExt, future, stream};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DispatchError, JsonRpcErrorObject, RegistryError, ToJsonRpcError, details};
use crate::params::{BoundArgs, ParamSpec};
use crate::registry::{HandlerResult, MethodHandler, MethodRegistry, panic_message};
use crate::request::{self, IncomingMessage};
use crate::response::{DispatchOutput, JsonRpcMessage};
use crate::types::RequestId;

/// Configuration for the dispatcher
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Largest accepted batch; larger batches are rejected as a whole (default: unlimited)
    pub max_batch_size: Option<usize>,
    /// Batch items in flight at once (default: all of them)
    pub batch_concurrency: Option<usize>,
}

impl DispatcherConfig {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    pub fn with_batch_concurrency(mut self, batch_concurrency: usize) -> Self {
        self.batch_concurrency = Some(batch_concurrency);
        self
    }
}

/// JSON-RPC 2.0 dispatcher
///
/// Takes already-parsed values, answers requests, stays silent for
/// notifications and fans batches out concurrently while keeping responses in
/// input order.
#[derive(Debug, Default)]
pub struct JsonRpcDispatcher {
    registry: MethodRegistry,
    config: DispatcherConfig,
}

impl JsonRpcDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            registry: MethodRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MethodRegistry {
        &mut self.registry
    }

    /// Register a handler for a method
    pub fn add_method<H>(
        &mut self,
        name: impl Into<String>,
        handler: H,
        params: Vec<ParamSpec>,
    ) -> Result<(), RegistryError>
    where
        H: MethodHandler + 'static,
    {
        self.registry.add_method(name, handler, params)
    }

    pub fn add_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        handler_fn: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.add_fn(name, params, handler_fn)
    }

    pub fn add_sync_fn<F>(
        &mut self,
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        handler_fn: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(BoundArgs) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.add_sync_fn(name, params, handler_fn)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.registry.has_method(name)
    }

    pub fn remove_method(&mut self, name: &str) {
        self.registry.remove_method(name)
    }

    /// Dispatch a single request or a batch.
    ///
    /// `Ok(None)` means nothing is to be sent back (a notification).
    pub async fn handle(&self, input: &Value) -> Result<Option<DispatchOutput>, DispatchError> {
        match input {
            Value::Array(batch) => self.handle_batch(batch).await.map(Some),
            _ => Ok(self.handle_request(input).await.map(DispatchOutput::Single)),
        }
    }

    /// Process one request value. Returns `None` for notifications, whatever
    /// their outcome.
    pub async fn handle_request(&self, request: &Value) -> Option<JsonRpcMessage> {
        let Some(message) = request::classify(request) else {
            let id = request::response_id(request);
            warn!(%id, "rejecting invalid JSON-RPC request");
            return Some(JsonRpcMessage::error(
                id,
                JsonRpcErrorObject::invalid_request(None),
            ));
        };

        let outcome = self.invoke(&message).await;

        match message {
            IncomingMessage::Notification(notification) => {
                if let Err(error) = outcome {
                    debug!(
                        method = %notification.method,
                        code = error.code,
                        "notification failed, response suppressed"
                    );
                }
                None
            }
            IncomingMessage::Request(request) => Some(match outcome {
                Ok(result) => JsonRpcMessage::success(request.id, result),
                Err(error) => JsonRpcMessage::error(request.id, error),
            }),
        }
    }

    async fn invoke(&self, message: &IncomingMessage) -> Result<Value, JsonRpcErrorObject> {
        let method = message.method();
        if !self.registry.has_method(method) {
            debug!(method, "method not found");
            return Err(JsonRpcErrorObject::method_not_found(None));
        }

        debug!(method, id = ?message.request_id(), "invoking method");
        self.registry
            .call_method(method, message.params())
            .await
            .map_err(|error| error.to_error_object())
    }

    /// Process a batch. Responses keep the input order and notifications are
    /// left out.
    ///
    /// An empty (or oversized) batch is answered with a single invalid request
    /// error. Handler panics are per-item application errors; only a panic
    /// outside any handler fails the whole batch.
    pub async fn handle_batch(&self, batch: &[Value]) -> Result<DispatchOutput, DispatchError> {
        if batch.is_empty() {
            warn!("rejecting empty batch");
            return Ok(batch_rejection(None));
        }
        if let Some(limit) = self.config.max_batch_size.filter(|limit| batch.len() > *limit) {
            warn!(size = batch.len(), limit, "rejecting oversized batch");
            return Ok(batch_rejection(Some(details(format!(
                "Batch size {} exceeds the limit of {}.",
                batch.len(),
                limit
            )))));
        }

        let items = batch.iter().enumerate().map(|(index, item)| async move {
            AssertUnwindSafe(self.handle_request(item))
                .catch_unwind()
                .await
                .map_err(|panic| DispatchError::BatchItemPanicked {
                    index,
                    message: panic_message(panic.as_ref()),
                })
        });

        let settled: Vec<Result<Option<JsonRpcMessage>, DispatchError>> =
            match self.config.batch_concurrency {
                Some(limit) => stream::iter(items).buffered(limit.max(1)).collect().await,
                None => future::join_all(items).await,
            };

        let mut responses = Vec::with_capacity(settled.len());
        for outcome in settled {
            match outcome {
                Ok(Some(response)) => responses.push(response),
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, "batch dispatch failed");
                    return Err(error);
                }
            }
        }

        debug!(size = batch.len(), responses = responses.len(), "batch complete");
        Ok(DispatchOutput::Batch(responses))
    }
}

fn batch_rejection(data: Option<Value>) -> DispatchOutput {
    DispatchOutput::Single(JsonRpcMessage::error(
        RequestId::Null,
        JsonRpcErrorObject::invalid_request(data),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use serde_json::json;

    fn dispatcher() -> JsonRpcDispatcher {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.add_sync_fn("test", vec![], |_| Ok(json!(42))).unwrap();
        dispatcher
            .add_sync_fn("fail", vec![], |_| Err(HandlerError::msg("Houston, we have a problem!")))
            .unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn test_success() {
        let response = dispatcher()
            .handle_request(&json!({"jsonrpc": "2.0", "id": 1, "method": "test"}))
            .await
            .unwrap();
        assert_eq!(response.to_value(), json!({"jsonrpc": "2.0", "id": 1, "result": 42}));
    }

    #[tokio::test]
    async fn test_application_error() {
        let response = dispatcher()
            .handle_request(&json!({"jsonrpc": "2.0", "id": 1, "method": "fail"}))
            .await
            .unwrap();
        assert_eq!(
            response.to_value(),
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": -1,
                    "message": "Application error",
                    "data": { "details": "Houston, we have a problem!" }
                }
            })
        );
    }

    #[tokio::test]
    async fn test_method_not_found_keeps_id() {
        let response = dispatcher()
            .handle_request(&json!({"jsonrpc": "2.0", "id": "abc", "method": "foo"}))
            .await
            .unwrap();
        assert_eq!(
            response.to_value(),
            json!({
                "jsonrpc": "2.0",
                "id": "abc",
                "error": {"code": -32601, "message": "Method not found"}
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_request_echoes_valid_id() {
        let dispatcher = dispatcher();

        let response = dispatcher.handle_request(&json!(1)).await.unwrap();
        assert_eq!(response.id(), &RequestId::Null);

        let response = dispatcher
            .handle_request(&json!({"jsonrpc": "2.0", "id": 7}))
            .await
            .unwrap();
        assert_eq!(response.id(), &RequestId::from(7));
        assert_eq!(response.error_object().unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_notifications_are_silent() {
        let dispatcher = dispatcher();
        for method in ["test", "fail", "missing"] {
            let notification = json!({"jsonrpc": "2.0", "method": method});
            assert!(dispatcher.handle_request(&notification).await.is_none());
            assert_eq!(dispatcher.handle(&notification).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_null_id_is_answered() {
        let response = dispatcher()
            .handle_request(&json!({"jsonrpc": "2.0", "id": null, "method": "test"}))
            .await
            .unwrap();
        assert_eq!(response.to_value(), json!({"jsonrpc": "2.0", "id": null, "result": 42}));
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let mut dispatcher =
            JsonRpcDispatcher::with_config(DispatcherConfig::default().with_max_batch_size(1));
        dispatcher.add_sync_fn("test", vec![], |_| Ok(json!(42))).unwrap();

        let request = json!({"jsonrpc": "2.0", "id": 1, "method": "test"});
        let output = dispatcher.handle_batch(&[request.clone(), request]).await.unwrap();
        let error = output.as_single().and_then(JsonRpcMessage::error_object).unwrap();

        assert_eq!(error.code, -32600);
        assert_eq!(error.details(), Some("Batch size 2 exceeds the limit of 1."));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_answered_per_request() {
        let mut dispatcher = dispatcher();
        dispatcher.add_sync_fn("explode", vec![], |_| panic!("boom")).unwrap();

        let response = dispatcher
            .handle_request(&json!({"jsonrpc": "2.0", "id": 9, "method": "explode"}))
            .await
            .unwrap();
        assert_eq!(response.id(), &RequestId::from(9));
        assert_eq!(response.error_object().and_then(JsonRpcErrorObject::details), Some("boom"));
        assert_eq!(response.result(), None);

        let notification = json!({"jsonrpc": "2.0", "method": "explode"});
        assert!(dispatcher.handle_request(&notification).await.is_none());
    }
}
