use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::HandlerError;

/// Signature every RPC callable implements. Arguments arrive positionally.
pub type RpcFn = Arc<dyn Fn(&[Value]) -> Result<Value, HandlerError> + Send + Sync>;

/// A named RPC callable with optional documentation.
#[derive(Clone)]
pub struct RpcHandler {
    name: String,
    doc: Option<String>,
    func: RpcFn,
}

impl std::fmt::Debug for RpcHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcHandler")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .finish()
    }
}

impl RpcHandler {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            doc: None,
            func: Arc::new(func),
        }
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Invoke with positional arguments, catching panics.
    pub fn call(&self, params: &[Value]) -> Result<Value, HandlerError> {
        let func = Arc::clone(&self.func);
        match catch_unwind(AssertUnwindSafe(|| func(params))) {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::from_panic(payload)),
        }
    }

    /// Identity comparison: both handles wrap the same callable.
    pub fn same_as(&self, other: &RpcHandler) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// Key accepted by [`RpcRegistry::unregister`].
pub enum RpcKey<'a> {
    Name(&'a str),
    Handler(&'a RpcHandler),
}

impl<'a> From<&'a str> for RpcKey<'a> {
    fn from(name: &'a str) -> Self {
        RpcKey::Name(name)
    }
}

impl<'a> From<&'a RpcHandler> for RpcKey<'a> {
    fn from(handler: &'a RpcHandler) -> Self {
        RpcKey::Handler(handler)
    }
}

/// Name → callable table consulted for every datagram.
#[derive(Clone, Default)]
pub struct RpcRegistry {
    handlers: Arc<RwLock<HashMap<String, RpcHandler>>>,
}

impl RpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a handler under its own name. The handler is handed
    /// back so callers can keep it for identity-based removal.
    pub fn register(&self, handler: RpcHandler) -> RpcHandler {
        let mut map = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = map.insert(handler.name.clone(), handler.clone()).is_some();
        info!(method = %handler.name, replaced = replaced, "RPC method registered");
        handler
    }

    /// Register a plain closure under `name`.
    pub fn register_fn<F>(&self, name: &str, func: F) -> RpcHandler
    where
        F: Fn(&[Value]) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register(RpcHandler::new(name, func))
    }

    /// Remove by name, or by handler identity. Removing by handler only
    /// succeeds while that exact callable is still the one registered.
    pub fn unregister<'a>(&self, key: impl Into<RpcKey<'a>>) -> bool {
        let mut map = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let removed = match key.into() {
            RpcKey::Name(name) => map.remove(name),
            RpcKey::Handler(handler) => {
                let current = map.get(&handler.name).is_some_and(|h| h.same_as(handler));
                if current {
                    map.remove(&handler.name)
                } else {
                    None
                }
            }
        };
        if let Some(h) = &removed {
            info!(method = %h.name, "RPC method removed");
        }
        removed.is_some()
    }

    /// Handler for `name`, cloned out of the table.
    pub fn lookup(&self, name: &str) -> Option<RpcHandler> {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let found = map.get(name).cloned();
        if found.is_none() {
            debug!(method = %name, "RPC method not in registry");
        }
        found
    }

    pub fn contains(&self, name: &str) -> bool {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        map.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    fn downgrade(&self) -> Weak<RwLock<HashMap<String, RpcHandler>>> {
        Arc::downgrade(&self.handlers)
    }

    fn from_weak(weak: &Weak<RwLock<HashMap<String, RpcHandler>>>) -> Result<Self, HandlerError> {
        weak.upgrade()
            .map(|handlers| Self { handlers })
            .ok_or_else(|| HandlerError::failed("registry dropped"))
    }

    /// `listall()`: every registered method name, sorted.
    ///
    /// The handler holds a weak reference so the registry does not keep
    /// itself alive.
    pub fn listall_handler(&self) -> RpcHandler {
        let weak = self.downgrade();
        RpcHandler::new("listall", move |_params| {
            let registry = Self::from_weak(&weak)?;
            Ok(json!(registry.list_names()))
        })
        .with_doc("listall() -> list of registered method names")
    }

    /// `help(name)`: the documentation string of a registered method, or
    /// null when the name is unknown or the method has no documentation.
    pub fn help_handler(&self) -> RpcHandler {
        let weak = self.downgrade();
        RpcHandler::new("help", move |params| {
            let registry = Self::from_weak(&weak)?;
            let name = match params.first() {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => return Err(HandlerError::failed("help() takes one argument (0 given)")),
            };
            // Unknown names and undocumented handlers both answer null.
            Ok(registry
                .lookup(&name)
                .and_then(|handler| handler.doc().map(|d| Value::String(d.to_string())))
                .unwrap_or(Value::Null))
        })
        .with_doc("help(name) -> documentation string of a registered method")
    }

    /// Register `listall` and `help`.
    pub fn install_introspection(&self) {
        self.register(self.listall_handler());
        self.register(self.help_handler());
    }
}
