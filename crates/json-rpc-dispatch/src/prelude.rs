//! # JSON-RPC Dispatch Prelude
//!
//! ```rust
//! use json_rpc_dispatch::prelude::*;
//! ```

pub use crate::dispatch::{DispatcherConfig, JsonRpcDispatcher};
pub use crate::error::{
    DispatchError, HandlerError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject,
    RegistryError, ToJsonRpcError,
};
pub use crate::notification::JsonRpcNotification;
pub use crate::params::{BoundArgs, ParamSpec, ParamType};
pub use crate::registry::{HandlerResult, InvocationContext, MethodHandler, MethodRegistry};
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{DispatchOutput, JsonRpcMessage, JsonRpcResponse};
pub use crate::types::{JsonRpcVersion, RequestId};

pub use crate::error_codes::*;
