//! Built-in Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. weft answers them.
//!
//! | Check | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on a group:
//!
//! ```rust,no_run
//! use weft::{Server, health};
//!
//! # fn main() -> weft::Result<()> {
//! let server = Server::new();
//! server
//!     .handler_group("")
//!     .get("/healthz", health::liveness)?
//!     .get("/readyz", health::readiness)?;
//! # Ok(())
//! # }
//! ```
//!
//! Register your own readiness handler instead if you need to gate on
//! dependency availability (database connections, downstream services, etc.).

use http::StatusCode;

use crate::context::Context;
use crate::error::Result;
use crate::handler::BoxFuture;

/// Kubernetes liveness check handler.
///
/// Always answers `200 OK` with body `"ok"`. If the process can respond to
/// HTTP at all, it is alive.
pub fn liveness(c: &mut Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move { c.response().string(StatusCode::OK, "ok").await })
}

/// Kubernetes readiness check handler (default implementation).
///
/// Answers `200 OK` with body `"ready"`.
pub fn readiness(c: &mut Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move { c.response().string(StatusCode::OK, "ready").await })
}
