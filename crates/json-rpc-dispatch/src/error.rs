use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

use crate::types::{JsonRpcVersion, RequestId};

/// JSON-RPC error codes known to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Non-standard code used to wrap arbitrary handler failures
    ApplicationError,
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => crate::error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => crate::error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => crate::error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => crate::error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => crate::error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::ApplicationError => crate::error_codes::APPLICATION_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ApplicationError => "Application error",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        [
            JsonRpcErrorCode::ParseError,
            JsonRpcErrorCode::InvalidRequest,
            JsonRpcErrorCode::MethodNotFound,
            JsonRpcErrorCode::InvalidParams,
            JsonRpcErrorCode::InternalError,
            JsonRpcErrorCode::ApplicationError,
        ]
        .into_iter()
        .find(|known| known.code() == code)
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// Build the `{"details": ...}` payload carried in `error.data`.
pub fn details(text: impl Into<String>) -> Value {
    json!({ "details": text.into() })
}

/// JSON-RPC error object: `{ code, message, data? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} ({code})")]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data,
        }
    }

    /// An error with a handler-defined code and message.
    pub fn custom(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, data)
    }

    pub fn method_not_found(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::MethodNotFound, data)
    }

    pub fn invalid_params(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidParams, data)
    }

    pub fn internal_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, data)
    }

    pub fn application_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ApplicationError, data)
    }

    /// The known error kind for this object's code, if any.
    pub fn kind(&self) -> Option<JsonRpcErrorCode> {
        JsonRpcErrorCode::from_code(self.code)
    }

    /// `data.details` when the payload follows the `{"details": ...}` shape.
    pub fn details(&self) -> Option<&str> {
        self.data.as_ref()?.get("details")?.as_str()
    }

    /// Plain JSON rendering of the error object.
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("code".to_string(), Value::from(self.code));
        object.insert("message".to_string(), Value::from(self.message.clone()));
        if let Some(data) = &self.data {
            object.insert("data".to_string(), data.clone());
        }
        Value::Object(object)
    }
}

/// JSON-RPC error response: `{ jsonrpc, id, error }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: RequestId, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(RequestId::Null, JsonRpcErrorObject::parse_error(None))
    }

    pub fn invalid_request(id: RequestId) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_request(None))
    }

    pub fn method_not_found(id: RequestId) -> Self {
        Self::new(id, JsonRpcErrorObject::method_not_found(None))
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC Error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

/// Errors that know how to render themselves as a JSON-RPC error object
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

impl ToJsonRpcError for JsonRpcErrorObject {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        self.clone()
    }
}

/// Failure raised by a method handler.
///
/// `Rpc` errors reach the client unchanged. Every other variant is reported
/// as an application error whose `data.details` is the error's message.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Rpc(#[from] JsonRpcErrorObject),

    #[error("{0}")]
    Failed(String),

    /// The handler panicked; carries the panic message
    #[error("{0}")]
    Panicked(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }

    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HandlerError::Other(Box::new(error))
    }
}

impl ToJsonRpcError for HandlerError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            HandlerError::Rpc(error) => error.clone(),
            other => JsonRpcErrorObject::application_error(Some(details(other.to_string()))),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Failed(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Failed(message.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        HandlerError::other(error)
    }
}

/// Registration-time programmer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Method names must not start with 'rpc.': {0}")]
    ReservedName(String),
}

/// Failures of the batch machinery itself, as opposed to per-request errors.
///
/// Handler panics never end up here; they are per-request application errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Dispatch of batch item {index} panicked: {message}")]
    BatchItemPanicked { index: usize, message: String },
}
