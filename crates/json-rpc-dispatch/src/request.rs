//! Request envelopes and the predicates that classify inbound values.
//!
//! The predicates operate on already-parsed [`serde_json::Value`]s and never
//! fail: anything that is not a JSON object is simply not a valid request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::notification::JsonRpcNotification;
use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC call
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Object(Map<String, Value>),
}

impl RequestParams {
    /// Accepts only the two argument shapes; scalars and `null` are not params.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(RequestParams::Array(items.clone())),
            Value::Object(map) => Some(RequestParams::Object(map.clone())),
            _ => None,
        }
    }

    /// Get a parameter by name (object params only)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    /// Get a parameter by index (array params only)
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RequestParams::Array(items) => items.get(index),
            RequestParams::Object(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestParams::Object(map) => map.is_empty(),
            RequestParams::Array(items) => items.is_empty(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => Value::Object(map.clone()),
            RequestParams::Array(items) => Value::Array(items.clone()),
        }
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(items: Vec<Value>) -> Self {
        RequestParams::Array(items)
    }
}

/// A JSON-RPC request that expects a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method: method.into(),
            params,
        }
    }

    pub fn new_no_params(id: RequestId, method: impl Into<String>) -> Self {
        Self::new(id, method, None)
    }

    pub fn to_value(&self) -> Value {
        // Only string keys and JSON values live in here.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A validated inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    pub fn method(&self) -> &str {
        match self {
            IncomingMessage::Request(request) => &request.method,
            IncomingMessage::Notification(notification) => &notification.method,
        }
    }

    pub fn params(&self) -> Option<&RequestParams> {
        match self {
            IncomingMessage::Request(request) => request.params.as_ref(),
            IncomingMessage::Notification(notification) => notification.params.as_ref(),
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, IncomingMessage::Notification(_))
    }

    /// The id to answer with, `None` for notifications
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            IncomingMessage::Request(request) => Some(&request.id),
            IncomingMessage::Notification(_) => None,
        }
    }
}

/// Turn a value into a typed message, or `None` if it is not a valid request.
pub fn classify(value: &Value) -> Option<IncomingMessage> {
    if !is_valid(value) {
        return None;
    }
    let object = value.as_object()?;
    let method = object.get("method")?.as_str()?.to_string();
    let params = object.get("params").and_then(RequestParams::from_value);

    let message = match object.get("id") {
        Some(id) => IncomingMessage::Request(JsonRpcRequest::new(
            RequestId::from_value(id)?,
            method,
            params,
        )),
        None => IncomingMessage::Notification(JsonRpcNotification::new(method, params)),
    };
    Some(message)
}

/// The id an error response for `value` should carry.
///
/// Malformed input is answered with `null` unless it is an object whose `id`
/// field is itself structurally valid, in which case that id is echoed.
pub fn response_id(value: &Value) -> RequestId {
    value
        .as_object()
        .and_then(|object| object.get("id"))
        .and_then(RequestId::from_value)
        .unwrap_or_default()
}

pub fn is_valid(value: &Value) -> bool {
    value.is_object()
        && has_valid_protocol_version(value)
        && has_valid_id(value)
        && has_valid_method(value)
        && has_valid_params(value)
}

/// Valid request without an `id` key. An explicit `"id": null` is a request.
pub fn is_notification(value: &Value) -> bool {
    is_valid(value) && value.as_object().is_some_and(|object| !object.contains_key("id"))
}

pub fn has_valid_protocol_version(value: &Value) -> bool {
    value
        .get("jsonrpc")
        .and_then(Value::as_str)
        .is_some_and(|version| version == crate::JSONRPC_VERSION)
}

pub fn has_valid_id(value: &Value) -> bool {
    match value.as_object() {
        Some(object) => object
            .get("id")
            .is_none_or(|id| RequestId::from_value(id).is_some()),
        None => false,
    }
}

pub fn has_valid_method(value: &Value) -> bool {
    value.get("method").is_some_and(Value::is_string)
}

pub fn has_valid_params(value: &Value) -> bool {
    match value.as_object() {
        Some(object) => object
            .get("params")
            .is_none_or(|params| params.is_object() || params.is_array()),
        None => false,
    }
}
