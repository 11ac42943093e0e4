//! The request lifecycle: what happens around every handler chain.
//!
//! For each dispatched request:
//!
//! 1. build a fresh [`Context`] over the raw request and response writer;
//! 2. ask the server's logger factory for a sink and wrap it;
//! 3. run the composed handler chain;
//! 4. log a returned error at error level, log a missing response as a fatal
//!    bug, then flush the sink. The flush happens once, always, last.
//!
//! Nothing the handler does escapes this boundary. Errors are logged, not
//! rethrown; a panic is caught and logged as a fatal bug; a missing response
//! is reported but not papered over with a synthesized one.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::context::Context;
use crate::handler::{BoxFuture, Handler};
use crate::logger::RequestLogger;
use crate::request::RawRequest;
use crate::router::Params;
use crate::server::Shared;
use crate::writer::ResponseWriter;

pub(crate) const MISSING_RESPONSE: &str = "Handler didn't write a response";

/// What the routing table stores: a fully wrapped handler chain bound to the
/// lifecycle, ready to run against one raw request.
pub(crate) type Endpoint =
    Arc<dyn Fn(RawRequest, Params, ResponseWriter) -> BoxFuture<'static, ()> + Send + Sync + 'static>;

/// Binds a composed handler chain to the lifecycle.
pub(crate) fn handler_shim(server: Arc<Shared>, handler: Handler) -> Endpoint {
    Arc::new(
        move |request: RawRequest, params: Params, writer: ResponseWriter| -> BoxFuture<'static, ()> {
            Box::pin(run(Arc::clone(&server), Arc::clone(&handler), request, params, writer))
        },
    )
}

async fn run(
    server: Arc<Shared>,
    handler: Handler,
    request: RawRequest,
    params: Params,
    writer: ResponseWriter,
) {
    let mut c = Context::new(Arc::clone(&server), request, params, writer);
    let sink = (server.logger_factory)(&c);
    c.log = RequestLogger::new(sink).with_stack_trace_limit(server.config.stack_trace_limit);

    match AssertUnwindSafe(handler(&mut c)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            c.log.error_fmt(format_args!("Error returned from request handler: {err}"));
        }
        Err(panic) => {
            c.log.fatal_bug_fmt(format_args!("Handler panicked: {}", panic_message(&*panic)));
        }
    }
    if !c.responded() {
        c.log.fatal_bug(MISSING_RESPONSE);
    }
    c.log.flush();
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
