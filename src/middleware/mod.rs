//! Built-in middleware.
//!
//! Middleware is the right place for cross-cutting concerns: structured
//! tracing, metrics, request-id injection, and authentication-header
//! inspection. Anything of type [`Middleware`](crate::Middleware) can be
//! added to a group; these are the ones weft ships.

mod trace;

pub use trace::trace;
