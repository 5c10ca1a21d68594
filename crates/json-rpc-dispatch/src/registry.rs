use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::{HandlerError, JsonRpcErrorObject, RegistryError};
use crate::params::{self, BoundArgs, ParamSpec};
use crate::request::RequestParams;

/// Result type for method handlers
pub type HandlerResult = Result<Value, HandlerError>;

/// Method names with this prefix are reserved for protocol extensions.
pub const RESERVED_PREFIX: &str = "rpc.";

/// Context a handler is invoked with.
///
/// Methods registered with an explicit context see that value; all others see
/// the registry they were called through.
#[derive(Clone, Copy)]
pub enum InvocationContext<'a> {
    Declared(&'a (dyn Any + Send + Sync)),
    Registry(&'a MethodRegistry),
}

impl<'a> InvocationContext<'a> {
    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        match *self {
            InvocationContext::Declared(context) => context.downcast_ref::<T>(),
            InvocationContext::Registry(registry) => (registry as &dyn Any).downcast_ref::<T>(),
        }
    }

    pub fn registry(&self) -> Option<&'a MethodRegistry> {
        match *self {
            InvocationContext::Declared(_) => None,
            InvocationContext::Registry(registry) => Some(registry),
        }
    }
}

/// Trait for JSON-RPC method implementations
///
/// Handlers receive arguments already bound to their declared parameters, so
/// they never look at the raw request shape.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, args: BoundArgs, context: InvocationContext<'_>) -> HandlerResult;
}

/// Handler backed by an async closure
pub struct FunctionHandler<F> {
    handler_fn: F,
}

impl<F> FunctionHandler<F> {
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F, Fut> MethodHandler for FunctionHandler<F>
where
    F: Fn(BoundArgs) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, args: BoundArgs, _context: InvocationContext<'_>) -> HandlerResult {
        (self.handler_fn)(args).await
    }
}

/// Handler backed by a plain closure
pub struct SyncFunctionHandler<F> {
    handler_fn: F,
}

impl<F> SyncFunctionHandler<F> {
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F> MethodHandler for SyncFunctionHandler<F>
where
    F: Fn(BoundArgs) -> HandlerResult + Send + Sync,
{
    async fn call(&self, args: BoundArgs, _context: InvocationContext<'_>) -> HandlerResult {
        (self.handler_fn)(args)
    }
}

/// A registered method
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<ParamSpec>,
    handler: Arc<dyn MethodHandler>,
    context: Option<Arc<dyn Any + Send + Sync>>,
}

impl MethodDescriptor {
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("has_context", &self.has_context())
            .finish()
    }
}

/// Methods keyed by name
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<MethodDescriptor>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method, replacing any previous one with the same name.
    pub fn add_method<H>(
        &mut self,
        name: impl Into<String>,
        handler: H,
        params: Vec<ParamSpec>,
    ) -> Result<(), RegistryError>
    where
        H: MethodHandler + 'static,
    {
        self.insert(name.into(), Arc::new(handler), params, None)
    }

    /// Register a method that is invoked with `context` instead of the registry.
    pub fn add_method_with_context<H, C>(
        &mut self,
        name: impl Into<String>,
        handler: H,
        params: Vec<ParamSpec>,
        context: C,
    ) -> Result<(), RegistryError>
    where
        H: MethodHandler + 'static,
        C: Any + Send + Sync,
    {
        self.insert(name.into(), Arc::new(handler), params, Some(Arc::new(context)))
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
        self.add_method(name, FunctionHandler::new(handler_fn), params)
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
        self.add_method(name, SyncFunctionHandler::new(handler_fn), params)
    }

    fn insert(
        &mut self,
        name: String,
        handler: Arc<dyn MethodHandler>,
        params: Vec<ParamSpec>,
        context: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<(), RegistryError> {
        if name.starts_with(RESERVED_PREFIX) {
            return Err(RegistryError::ReservedName(name));
        }
        let descriptor = MethodDescriptor {
            name: name.clone(),
            params,
            handler,
            context,
        };
        self.methods.insert(name, Arc::new(descriptor));
        Ok(())
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Removing an unknown method is a no-op.
    pub fn remove_method(&mut self, name: &str) {
        self.methods.remove(name);
    }

    pub fn descriptor(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods.get(name).cloned()
    }

    /// Registered method names, sorted
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Bind and validate `args` for `name`, then run its handler.
    ///
    /// A panicking handler is reported as [`HandlerError::Panicked`].
    pub async fn call_method(&self, name: &str, args: Option<&RequestParams>) -> HandlerResult {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| JsonRpcErrorObject::method_not_found(None))?;

        let bound = params::bind(args, &descriptor.params);
        trace!(method = name, arg_count = bound.len(), "bound arguments");
        params::validate(&bound, &descriptor.params)?;

        let context = match descriptor.context.as_deref() {
            Some(context) => InvocationContext::Declared(context),
            None => InvocationContext::Registry(self),
        };
        AssertUnwindSafe(descriptor.handler.call(bound, context))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                warn!(method = name, text = %message, "method handler panicked");
                Err(HandlerError::Panicked(message))
            })
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.method_names())
            .finish()
    }
}
