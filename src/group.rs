//! Handler groups: path prefixes with inherited middleware.
//!
//! A group owns its middleware list outright. Deriving a child copies the
//! parent's list as it is at that moment, so middleware added to either side
//! afterwards stays on that side:
//!
//! ```rust,no_run
//! # use weft::{Server, Middleware};
//! # fn auth() -> Middleware { unimplemented!() }
//! # fn audit() -> Middleware { unimplemented!() }
//! let server = Server::builder().build();
//! let mut api = server.handler_group("/api");
//! api.add_middleware([auth()]);
//!
//! let mut v1 = api.handler_group("/v1");   // v1 runs auth
//! api.add_middleware([audit()]);           // v1 still only runs auth
//! # let _ = &mut v1;
//! ```
//!
//! Registering a route snapshots the group's list as well: middleware added
//! after a route is registered does not apply to that route.

use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;

use crate::context::Context;
use crate::error::Result;
use crate::handler::{BoxFuture, Handler, Middleware, compose, handler_fn};
use crate::lifecycle::handler_shim;
use crate::router::Router;
use crate::server::Shared;

/// A scope for adding middleware and routes under a common path prefix.
pub struct HandlerGroup {
    server: Arc<Shared>,
    router: Arc<RwLock<Router>>,
    parent: Option<String>,
    middleware: Vec<Middleware>,
    base_path: String,
}

impl HandlerGroup {
    pub(crate) fn root(server: Arc<Shared>, router: Arc<RwLock<Router>>, base_path: &str) -> Self {
        Self { server, router, parent: None, middleware: Vec::new(), base_path: base_path.to_owned() }
    }

    /// The full path prefix of this group.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// The prefix of the group this one was derived from, `None` for groups
    /// obtained from the server.
    pub fn parent_path(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Appends middleware. Earlier middleware wraps later middleware, and
    /// only routes registered after this call see it.
    pub fn add_middleware(&mut self, middleware: impl IntoIterator<Item = Middleware>) -> &mut Self {
        self.middleware.extend(middleware);
        self
    }

    /// Derives a child group under `base_path`, inheriting a copy of this
    /// group's middleware.
    pub fn handler_group(&self, base_path: &str) -> HandlerGroup {
        HandlerGroup {
            server: Arc::clone(&self.server),
            router: Arc::clone(&self.router),
            parent: Some(self.base_path.clone()),
            middleware: self.middleware.clone(),
            base_path: format!("{}{}", self.base_path, base_path),
        }
    }

    /// Derives a child group and hands it to `register`.
    pub fn add_handler_group<F>(&self, base_path: &str, register: F) -> Result<()>
    where
        F: FnOnce(&mut HandlerGroup) -> Result<()>,
    {
        register(&mut self.handler_group(base_path))
    }

    /// Registers an already-built [`Handler`] for `method` at this group's
    /// prefix plus `path`.
    pub fn handle(&self, method: Method, path: &str, handler: Handler) -> Result<&Self> {
        let path = format!("{}{}", self.base_path, path);
        let endpoint = handler_shim(Arc::clone(&self.server), compose(&self.middleware, handler));
        self.router.write().insert(method, &path, endpoint)?;
        tracing::debug!(path = %path, layers = self.middleware.len(), "route registered");
        Ok(self)
    }

    /// Registers `handler` for `GET` requests to this group's prefix plus `path`.
    pub fn get<F>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.handle(Method::GET, path, handler_fn(handler))
    }

    /// Registers `handler` for `POST` requests to this group's prefix plus `path`.
    pub fn post<F>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.handle(Method::POST, path, handler_fn(handler))
    }

    /// Registers `handler` for `PUT` requests to this group's prefix plus `path`.
    pub fn put<F>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.handle(Method::PUT, path, handler_fn(handler))
    }

    /// Registers `handler` for `PATCH` requests to this group's prefix plus `path`.
    pub fn patch<F>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.handle(Method::PATCH, path, handler_fn(handler))
    }

    /// Registers `handler` for `DELETE` requests to this group's prefix plus `path`.
    pub fn delete<F>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.handle(Method::DELETE, path, handler_fn(handler))
    }

    /// Registers `handler` for `HEAD` requests to this group's prefix plus `path`.
    pub fn head<F>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.handle(Method::HEAD, path, handler_fn(handler))
    }

    /// Registers `handler` for `OPTIONS` requests to this group's prefix plus `path`.
    pub fn options<F>(&self, path: &str, handler: F) -> Result<&Self>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.handle(Method::OPTIONS, path, handler_fn(handler))
    }
}
