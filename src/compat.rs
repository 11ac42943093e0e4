//! Running `tower` services and layers inside a weft handler chain.
//!
//! [`service_handler`] turns a `Service<http::Request<_>>` into a leaf
//! [`Handler`]. [`layer_middleware`] turns a `Layer` into [`Middleware`]: the
//! layer wraps a [`ChainService`] that runs the rest of the weft chain when
//! called, and whatever response the layered service produces is what the
//! client gets.
//!
//! ```rust,no_run
//! use std::convert::Infallible;
//!
//! use http::Response;
//! use http_body_util::Full;
//! use weft::{RequestBody, Server, layer_middleware, service_handler};
//!
//! # fn main() -> weft::Result<()> {
//! let server = Server::new();
//! let mut group = server.handler_group("/legacy");
//! group.add_middleware([layer_middleware(tower::util::MapRequestLayer::new(
//!     |mut req: http::Request<RequestBody>| {
//!         req.headers_mut().insert("x-legacy", http::HeaderValue::from_static("1"));
//!         req
//!     },
//! ))]);
//! group.handle(
//!     http::Method::GET,
//!     "/ping",
//!     service_handler(tower::service_fn(|_req: http::Request<RequestBody>| async {
//!         Ok::<_, Infallible>(Response::new(Full::new(bytes::Bytes::from("pong"))))
//!     })),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::pin::pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::BodyExt;
use hyper::body::Body;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service, ServiceExt};

use crate::body::{RequestBody, ResponseBody};
use crate::context::Context;
use crate::error::{BoxError, Error, Result};
use crate::handler::{BoxFuture, Handler, Middleware, handler_fn, middleware_fn};
use crate::lifecycle::MISSING_RESPONSE;
use crate::writer::ResponseWriter;

/// Runs `service` as a leaf handler.
///
/// The service gets the request with its headers and body; the peer address,
/// when known, rides along as a `SocketAddr` extension. Its response is
/// written through the escape hatch, so the request counts as answered once
/// the service returns one. A service error is returned as
/// [`Error::Handler`] with nothing written.
pub fn service_handler<S, B>(service: S) -> Handler
where
    S: Service<Request<RequestBody>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + Send,
{
    handler_fn(move |c| {
        let service = service.clone();
        Box::pin(async move {
            ensure_unanswered(c)?;
            let req = request_from(c);
            let fut: BoxFuture<'static, _> = Box::pin(service.oneshot(req));
            let res = fut.await.map_err(Error::handler)?;
            let (_, writer) = c.escape_hatch();
            forward(res, writer).await
        })
    })
}

/// Runs the request through `layer` wrapped around the rest of the chain.
///
/// Changes the layer makes to the request (method, URI, headers, body) are
/// what inner handlers see. Inner handlers write through the usual facades;
/// their response is handed to the layer as a [`ResponseBody`], and the
/// layer's final response is what goes out. A layer may answer without
/// calling inner handlers at all.
///
/// If the layer calls through but the inner chain writes nothing, the
/// missing response is logged as a fatal bug here, since the layer still
/// hands the client a default `200`.
pub fn layer_middleware<L, S, B>(layer: L) -> Middleware
where
    L: Layer<ChainService, Service = S> + Send + Sync + 'static,
    S: Service<Request<RequestBody>, Response = Response<B>> + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + Send,
{
    let layer = Arc::new(layer);
    middleware_fn(move |next: Handler| {
        let layer = Arc::clone(&layer);
        handler_fn(move |c| {
            let next = next.clone();
            let layer = Arc::clone(&layer);
            Box::pin(async move { run_layered(c, next, &*layer).await })
        })
    })
}

async fn run_layered<L, S, B>(c: &mut Context, next: Handler, layer: &L) -> Result<()>
where
    L: Layer<ChainService, Service = S>,
    S: Service<Request<RequestBody>, Response = Response<B>> + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + Send,
{
    ensure_unanswered(c)?;

    let (req_tx, req_rx) = oneshot::channel();
    let (res_tx, res_rx) = oneshot::channel();
    let service = layer.layer(ChainService::new(req_tx, res_rx));
    let req = request_from(c);

    // The real writer stays out here for the layered response; inner
    // handlers write into `capture`, which feeds the layer.
    let mut real = std::mem::replace(c.escape_hatch().1, detached_writer());
    let (capture, pending) = ResponseWriter::channel(c.server.config.body_buffer);
    let outer_done = CancellationToken::new();

    let inner = async {
        let req = tokio::select! {
            biased;
            req = req_rx => req,
            () = outer_done.cancelled() => return Ok(()),
        };
        let Ok(req) = req else {
            return Ok(());
        };
        let (parts, body) = req.into_parts();
        c.request.parts = parts;
        c.request.body = body;

        *c.response.raw_mut() = capture;
        let res = next(&mut *c).await;
        if c.response.raw().committed_status().is_none() {
            c.log.fatal_bug(MISSING_RESPONSE);
        }
        // Dropping the capture writer ends the body the layer is reading.
        *c.response.raw_mut() = detached_writer();
        res
    };
    let answer = async {
        let _ = res_tx.send(pending.into_response().await);
    };
    let outer = async {
        let fut: BoxFuture<'static, _> = Box::pin(service.oneshot(req));
        let res = fut.await;
        outer_done.cancel();
        forward(res.map_err(Error::handler)?, &mut real).await
    };

    let (inner_res, (), outer_res) = tokio::join!(inner, answer, outer);
    *c.response.raw_mut() = real;
    inner_res.and(outer_res)
}

/// The rest of a weft handler chain, seen from inside a `tower` layer.
///
/// Answers one call. A second call fails.
#[derive(Clone)]
pub struct ChainService {
    slot: Arc<Mutex<Option<ChainSlot>>>,
}

type ChainSlot = (oneshot::Sender<Request<RequestBody>>, oneshot::Receiver<Response<ResponseBody>>);

impl ChainService {
    fn new(
        req_tx: oneshot::Sender<Request<RequestBody>>,
        res_rx: oneshot::Receiver<Response<ResponseBody>>,
    ) -> Self {
        Self { slot: Arc::new(Mutex::new(Some((req_tx, res_rx)))) }
    }
}

impl Service<Request<RequestBody>> for ChainService {
    type Response = Response<ResponseBody>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Response<ResponseBody>, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), BoxError>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<RequestBody>) -> Self::Future {
        let slot = self.slot.lock().take();
        Box::pin(async move {
            let (req_tx, res_rx) = slot.ok_or("handler chain already called")?;
            req_tx.send(req).map_err(|_| "handler chain is gone")?;
            Ok(res_rx.await.map_err(|_| "handler chain ended without a response")?)
        })
    }
}

fn ensure_unanswered(c: &Context) -> Result<()> {
    match c.status_code() {
        0 => Ok(()),
        prior => Err(Error::StatusAlreadyWritten(prior)),
    }
}

/// The request as an `http::Request`, taking the body out of the context.
fn request_from(c: &mut Context) -> Request<RequestBody> {
    let raw = &mut c.request;
    let mut req = Request::new(raw.take_body());
    *req.method_mut() = raw.parts.method.clone();
    *req.uri_mut() = raw.parts.uri.clone();
    *req.version_mut() = raw.parts.version;
    *req.headers_mut() = raw.parts.headers.clone();
    if let Some(addr) = raw.remote_addr {
        req.extensions_mut().insert(addr);
    }
    req
}

/// A writer nobody reads from.
fn detached_writer() -> ResponseWriter {
    ResponseWriter::channel(1).0
}

/// Copies a `tower` response into the raw writer.
async fn forward<B>(res: Response<B>, writer: &mut ResponseWriter) -> Result<()>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = res.into_parts();
    writer.headers_mut().extend(parts.headers);
    if !writer.write_head(parts.status) {
        let prior = writer.committed_status().map_or(0, |s| s.as_u16());
        return Err(Error::StatusAlreadyWritten(prior));
    }

    let mut body = pin!(body);
    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                let e: BoxError = e.into();
                writer.abort(format!("response body failed: {e}")).await;
                return Err(Error::Handler(e));
            }
        };
        if let Ok(data) = frame.into_data() {
            writer.write(data).await.map_err(Error::Write)?;
        }
    }
    Ok(())
}
