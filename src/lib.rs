//! # weft
//!
//! The request-handling core of an HTTP service: grouped middleware chains
//! and a per-request lifecycle that always accounts for what happened.
//!
//! ## The contract
//!
//! - **Groups** carry a path prefix and a middleware list. A child group
//!   copies its parent's list when it is derived; nothing added later leaks
//!   across. The first middleware added is the outermost.
//! - **Handlers** get a [`Context`]: a [`Scope`] for request-scoped values
//!   and cancellation, a [`RequestLogger`], and facades for reading the
//!   request and writing the response.
//! - **The lifecycle** logs a returned error, reports a handler that never
//!   wrote a response as a fatal bug, and flushes the request's log sink
//!   exactly once, whatever the handler did.
//!
//! Routing ([`matchit`]), HTTP framing (hyper), struct encoding (serde) and
//! the log sink are collaborators behind small seams. Existing `tower`
//! services and layers plug in through [`service_handler`] and
//! [`layer_middleware`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use weft::{Server, middleware};
//!
//! #[tokio::main]
//! async fn main() -> weft::Result<()> {
//!     let server = Server::new();
//!
//!     let mut api = server.handler_group("/api");
//!     api.add_middleware([middleware::trace()]);
//!     api.get("/users/{id}", |c| Box::pin(async move {
//!         let id = c.request().param("id").unwrap_or("unknown").to_owned();
//!         c.response().string(StatusCode::OK, format!("user {id}")).await
//!     }))?;
//!
//!     server.serve("0.0.0.0:3000").await
//! }
//! ```

mod body;
mod codec;
mod compat;
mod config;
mod context;
mod error;
mod group;
mod handler;
mod lifecycle;
mod logger;
mod request;
mod response;
mod router;
mod scope;
mod server;
mod sink;
mod tracker;
mod writer;

pub mod health;
pub mod middleware;

pub use body::{RequestBody, ResponseBody, empty_request_body, request_body};
pub use codec::{AcceptAll, JsonCodec, StructDecoder, StructEncoder, StructValidator};
pub use compat::{ChainService, layer_middleware, service_handler};
pub use config::Config;
pub use context::Context;
pub use error::{BoxError, Error, Result};
pub use group::HandlerGroup;
pub use handler::{BoxFuture, Handler, Middleware, handler_fn, middleware_fn};
pub use logger::{DEFAULT_STACK_TRACE_LIMIT, LogSink, RequestLogger};
pub use request::{ContextRequest, RawRequest};
pub use response::{ContentType, ContextResponse};
pub use router::Params;
pub use scope::Scope;
pub use server::{ClientHost, LoggerFactory, Server, ServerBuilder};
pub use sink::TracingLogSink;
pub use writer::{PendingResponse, ResponseWriter};
