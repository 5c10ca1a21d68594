//! Binding of call arguments onto a method's declared parameter list.
//!
//! Arguments arrive either positionally or by name. [`bind`] resolves both
//! shapes into one positional [`BoundArgs`] sequence, and [`validate`] checks
//! it against the declared [`ParamSpec`]s. An absent argument is `None`,
//! which is distinct from a JSON `null`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{JsonRpcErrorObject, details};
use crate::request::RequestParams;

/// Semantic type tag of a JSON value
///
/// `null` is tagged `object`. Type names outside the known set are kept as
/// [`ParamType::Other`] and never match any value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Other(String),
}

impl ParamType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ParamType::String,
            Value::Number(_) => ParamType::Number,
            Value::Bool(_) => ParamType::Boolean,
            Value::Array(_) => ParamType::Array,
            Value::Object(_) | Value::Null => ParamType::Object,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Other(name) => name,
        }
    }
}

impl From<String> for ParamType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "string" => ParamType::String,
            "number" => ParamType::Number,
            "boolean" => ParamType::Boolean,
            "array" => ParamType::Array,
            "object" => ParamType::Object,
            _ => ParamType::Other(name),
        }
    }
}

impl From<ParamType> for String {
    fn from(param_type: ParamType) -> Self {
        match param_type {
            ParamType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter of a method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<ParamType>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ParamSpec {
    /// A required parameter without a type constraint
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: None,
            required: true,
        }
    }

    pub fn typed(name: impl Into<String>, param_type: ParamType) -> Self {
        Self::new(name).with_type(param_type)
    }

    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Positional arguments after binding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs(Vec<Option<Value>>);

impl BoundArgs {
    pub fn new(args: Vec<Option<Value>>) -> Self {
        Self(args)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The argument at `index`, `None` when absent
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)?.as_ref()
    }

    /// Deserialize a required argument.
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> Result<T, JsonRpcErrorObject> {
        match self.optional(index)? {
            Some(value) => Ok(value),
            None => Err(JsonRpcErrorObject::invalid_params(Some(details(format!(
                "Missing argument at position {}.",
                index
            ))))),
        }
    }

    /// Deserialize an argument that may be absent.
    pub fn optional<T: DeserializeOwned>(
        &self,
        index: usize,
    ) -> Result<Option<T>, JsonRpcErrorObject> {
        self.get(index)
            .map(|value| {
                T::deserialize(value).map_err(|e| {
                    JsonRpcErrorObject::invalid_params(Some(details(format!(
                        "Invalid argument at position {}: {}",
                        index, e
                    ))))
                })
            })
            .transpose()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Value>> {
        self.0.iter().map(Option::as_ref)
    }

    pub fn into_inner(self) -> Vec<Option<Value>> {
        self.0
    }
}

impl From<Vec<Value>> for BoundArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values.into_iter().map(Some).collect())
    }
}

/// Resolve supplied arguments into positional order.
///
/// Positional arguments are copied as they are, whatever their count. Named
/// arguments are looked up by each declared parameter's name. Anything else
/// binds to an empty list.
pub fn bind(args: Option<&RequestParams>, schema: &[ParamSpec]) -> BoundArgs {
    match args {
        Some(RequestParams::Array(items)) => BoundArgs::from(items.clone()),
        Some(RequestParams::Object(map)) => BoundArgs(
            schema
                .iter()
                .map(|param| map.get(&param.name).cloned())
                .collect(),
        ),
        None => BoundArgs::default(),
    }
}

/// Check bound arguments against the schema, stopping at the first offending
/// parameter.
pub fn validate(args: &BoundArgs, schema: &[ParamSpec]) -> Result<(), JsonRpcErrorObject> {
    for (index, param) in schema.iter().enumerate() {
        let arg = args.get(index);

        if param.required && arg.is_none() {
            return Err(JsonRpcErrorObject::invalid_params(Some(details(format!(
                "Parameter '{}' is required.",
                param.name
            )))));
        }

        if let (Some(expected), Some(value)) = (&param.param_type, arg) {
            let actual = ParamType::of(value);
            if actual != *expected {
                return Err(JsonRpcErrorObject::invalid_params(Some(details(format!(
                    "Invalid type for parameter '{}': expected '{}' but received '{}'.",
                    param.name, expected, actual
                )))));
            }
        }
    }
    Ok(())
}
