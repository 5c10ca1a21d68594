//! # JSON-RPC 2.0 Dispatch
//!
//! A transport-agnostic JSON-RPC 2.0 dispatch core. It works on already
//! parsed [`serde_json::Value`]s and leaves reading and writing JSON text to
//! the transport.
//!
//! ## Features
//! - Request validation with per-field predicates
//! - Positional and named arguments bound onto declared parameter lists
//! - Async and sync method handlers with an optional invocation context
//! - Batches dispatched concurrently, answered in input order
//! - Notifications never produce a response, not even on failure
//!
//! ```rust
//! use json_rpc_dispatch::prelude::*;
//! use serde_json::json;
//!
//! let mut dispatcher = JsonRpcDispatcher::new();
//! dispatcher
//!     .add_sync_fn(
//!         "add",
//!         vec![
//!             ParamSpec::typed("a", ParamType::Number),
//!             ParamSpec::typed("b", ParamType::Number),
//!         ],
//!         |args| Ok(json!(args.value::<i64>(0)? + args.value::<i64>(1)?)),
//!     )
//!     .unwrap();
//!
//! let request = json!({"jsonrpc": "2.0", "id": 1, "method": "add", "params": {"a": 2, "b": 3}});
//! let response = futures::executor::block_on(dispatcher.handle(&request)).unwrap();
//! assert_eq!(response.unwrap().to_value(), json!({"jsonrpc": "2.0", "id": 1, "result": 5}));
//! ```

pub mod dispatch;
pub mod error;
pub mod notification;
pub mod params;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use dispatch::{DispatcherConfig, JsonRpcDispatcher};
pub use error::{
    DispatchError, HandlerError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject,
    RegistryError, ToJsonRpcError,
};
pub use notification::JsonRpcNotification;
pub use params::{BoundArgs, ParamSpec, ParamType};
pub use registry::{
    FunctionHandler, HandlerResult, InvocationContext, MethodDescriptor, MethodHandler,
    MethodRegistry, SyncFunctionHandler,
};
pub use request::{IncomingMessage, JsonRpcRequest, RequestParams};
pub use response::{DispatchOutput, JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Error codes used by the dispatcher
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Not part of JSON-RPC 2.0; wraps failures raised by method handlers
    pub const APPLICATION_ERROR: i64 = -1;
}
