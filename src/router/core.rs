use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use http::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec::{Body, FormValue, Status};
use crate::error::HandlerError;

/// Arguments bound for one handler call, in the route's declared order.
///
/// A declared parameter missing from the request is present with `None`, so
/// handlers see every name they asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerArgs {
    values: Vec<(String, Option<FormValue>)>,
}

impl HandlerArgs {
    pub fn new(values: Vec<(String, Option<FormValue>)>) -> Self {
        Self { values }
    }

    /// Text value of a parameter. File parts have no text form and return `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(FormValue::as_text)
    }

    /// Raw bytes of a parameter, whatever its kind.
    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.value(name).map(FormValue::as_bytes)
    }

    pub fn value(&self, name: &str) -> Option<&FormValue> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a handler hands back: a body with the method's default status, or
/// an explicit `(status, body)` pair.
#[derive(Debug)]
pub enum Reply {
    Body(Body),
    WithStatus(Status, Body),
}

impl Reply {
    pub fn with_status(status: Status, body: impl Into<Body>) -> Self {
        Reply::WithStatus(status, body.into())
    }

    /// Split into status and body, filling in `default` when unset.
    pub fn into_parts(self, default: Status) -> (Status, Body) {
        match self {
            Reply::Body(body) => (default, body),
            Reply::WithStatus(status, body) => (status, body),
        }
    }
}

impl From<Body> for Reply {
    fn from(body: Body) -> Self {
        Reply::Body(body)
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Body(Body::Text(s))
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Body(Body::Text(s.to_string()))
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Reply::Body(Body::Json(v))
    }
}

impl From<(Status, Body)> for Reply {
    fn from((status, body): (Status, Body)) -> Self {
        Reply::WithStatus(status, body)
    }
}

/// Signature every HTTP handler implements.
pub type HttpHandler = Arc<dyn Fn(&HandlerArgs) -> Result<Reply, HandlerError> + Send + Sync>;

/// One registered route: its parameter list and handler.
#[derive(Clone)]
pub struct Route {
    pub params: Vec<String>,
    handler: HttpHandler,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("params", &self.params).finish()
    }
}

impl Route {
    pub fn new(params: Vec<String>, handler: HttpHandler) -> Self {
        Self { params, handler }
    }

    /// Bind the declared parameters by name from `lookup`.
    pub fn bind<F>(&self, mut lookup: F) -> HandlerArgs
    where
        F: FnMut(&str) -> Option<FormValue>,
    {
        HandlerArgs::new(
            self.params
                .iter()
                .map(|name| (name.clone(), lookup(name)))
                .collect(),
        )
    }

    /// Run the handler, turning a panic into [`HandlerError::Panicked`].
    pub fn invoke(&self, args: &HandlerArgs) -> Result<Reply, HandlerError> {
        let handler = Arc::clone(&self.handler);
        match catch_unwind(AssertUnwindSafe(|| handler(args))) {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::from_panic(payload)),
        }
    }
}

#[derive(Default)]
struct RouteTables {
    get: HashMap<String, Route>,
    post: HashMap<String, Route>,
    put: HashMap<String, Route>,
    delete: HashMap<String, Route>,
}

impl RouteTables {
    fn table(&self, method: &Method) -> Option<&HashMap<String, Route>> {
        match *method {
            Method::GET => Some(&self.get),
            Method::POST => Some(&self.post),
            Method::PUT => Some(&self.put),
            Method::DELETE => Some(&self.delete),
            _ => None,
        }
    }

    fn table_mut(&mut self, method: &Method) -> Option<&mut HashMap<String, Route>> {
        match *method {
            Method::GET => Some(&mut self.get),
            Method::POST => Some(&mut self.post),
            Method::PUT => Some(&mut self.put),
            Method::DELETE => Some(&mut self.delete),
            _ => None,
        }
    }
}

/// Per-method exact-path route tables.
///
/// Paths are compared literally against the decoded request path: no
/// patterns, no trailing-slash folding. Re-registering a path replaces the
/// previous route.
#[derive(Clone, Default)]
pub struct Router {
    tables: Arc<RwLock<RouteTables>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` + `path`.
    ///
    /// Returns `false` (and logs) for methods that have no route table, e.g.
    /// OPTIONS, which the server answers itself.
    pub fn register<F>(&self, method: Method, path: &str, params: &[&str], handler: F) -> bool
    where
        F: Fn(&HandlerArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        let route = Route::new(
            params.iter().map(|p| p.to_string()).collect(),
            Arc::new(handler),
        );
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(table) = tables.table_mut(&method) else {
            warn!(method = %method, path = %path, "No route table for method, handler not registered");
            return false;
        };
        let replaced = table.insert(path.to_string(), route).is_some();
        info!(
            method = %method,
            path = %path,
            params = ?params,
            replaced = replaced,
            "Route registered"
        );
        true
    }

    pub fn get<F>(&self, path: &str, params: &[&str], handler: F) -> bool
    where
        F: Fn(&HandlerArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.register(Method::GET, path, params, handler)
    }

    pub fn post<F>(&self, path: &str, params: &[&str], handler: F) -> bool
    where
        F: Fn(&HandlerArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.register(Method::POST, path, params, handler)
    }

    pub fn put<F>(&self, path: &str, params: &[&str], handler: F) -> bool
    where
        F: Fn(&HandlerArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.register(Method::PUT, path, params, handler)
    }

    pub fn delete<F>(&self, path: &str, params: &[&str], handler: F) -> bool
    where
        F: Fn(&HandlerArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.register(Method::DELETE, path, params, handler)
    }

    /// Exact-match lookup. The route is cloned out so the lock is released
    /// before the handler runs.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Route> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let found = tables.table(method)?.get(path).cloned();
        if found.is_none() {
            debug!(method = %method, path = %path, "No route matched");
        }
        found
    }

    pub fn unregister(&self, method: &Method, path: &str) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let removed = tables
            .table_mut(method)
            .and_then(|t| t.remove(path))
            .is_some();
        if removed {
            info!(method = %method, path = %path, "Route removed");
        }
        removed
    }

    /// Registered `(method, path)` pairs, sorted.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            if let Some(table) = tables.table(&method) {
                out.extend(table.keys().map(|p| (method.clone(), p.clone())));
            }
        }
        out.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        out
    }
}
