//! Per-request tracing span with method, path, status, and latency.

use std::time::Instant;

use tracing::{Instrument, info_span};

use crate::handler::{Handler, Middleware, handler_fn, middleware_fn};

/// Runs the rest of the chain inside a `request` span carrying the method
/// and path, then logs the status, body size, and latency to the request
/// logger.
///
/// Add it first so the span covers every other middleware.
pub fn trace() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |c| {
            let next = next.clone();
            Box::pin(async move {
                let span = info_span!("request", method = %c.method(), path = c.path());
                let start = Instant::now();
                let res = next(c).instrument(span).await;
                let elapsed = start.elapsed();
                let (status, bytes) = (c.status_code(), c.bytes_written());
                c.log().info_fmt(format_args!("status={status} bytes={bytes} elapsed={elapsed:?}"));
                res
            })
        })
    })
}
