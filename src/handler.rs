//! Handlers, middleware, and chain composition.
//!
//! # How handlers are stored
//!
//! A route ends up holding one [`Handler`]: an `Arc` around a closure that
//! borrows the request [`Context`] mutably and returns a boxed future tied to
//! that borrow. Middleware is a plain function from `Handler` to `Handler`,
//! so composing a chain is a right fold over the middleware list:
//!
//! ```text
//! [m0, m1, m2] + leaf
//!        ↓ compose
//! m0(m1(m2(leaf)))      ← m0 sees the request first and the result last
//! ```
//!
//! The per-request cost is one virtual call per layer plus one boxed future
//! per layer.
//!
//! # Writing handlers
//!
//! The closure must return a `BoxFuture` borrowing the context, which is what
//! `Box::pin(async move { … })` produces:
//!
//! ```rust,no_run
//! use weft::{handler_fn, Handler};
//! use http::StatusCode;
//!
//! let hello: Handler = handler_fn(|c| Box::pin(async move {
//!     c.response().string(StatusCode::OK, "hello").await
//! }));
//! ```
//!
//! Middleware clones `next` into each request's future:
//!
//! ```rust,no_run
//! use weft::{handler_fn, middleware_fn, Handler, Middleware};
//!
//! let audit: Middleware = middleware_fn(|next: Handler| {
//!     handler_fn(move |c| {
//!         let next = next.clone();
//!         Box::pin(async move {
//!             c.log().info("entering");
//!             let res = next(c).await;
//!             c.log().info("leaving");
//!             res
//!         })
//!     })
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

/// A heap-allocated, type-erased future.
///
/// `Send` lets tokio move the request task across worker threads; `'a` ties
/// the future to the context borrow it was created from.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One unit of request-processing logic: a leaf handler or a
/// middleware-wrapped composite.
pub type Handler =
    Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static>;

/// A transformer from one handler into another.
///
/// Middleware is configured once, when it is built, and applied once per
/// route registration. It must not keep mutable state between requests.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync + 'static>;

/// Turns a closure into a [`Handler`].
///
/// Exists so the closure's signature is inferred from the higher-ranked
/// bound; without it `|c| Box::pin(async move { … })` cannot name the
/// lifetime linking `c` to the returned future.
pub fn handler_fn<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Turns a closure into a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Folds `middleware` over `leaf` from last to first, so the first element
/// ends up outermost. An empty list returns `leaf` unchanged.
pub(crate) fn compose(middleware: &[Middleware], leaf: Handler) -> Handler {
    middleware.iter().rev().fold(leaf, |next, m| m(next))
}
