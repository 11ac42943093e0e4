//! The server aggregate, request dispatch, and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! [`Server::serve`] reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Asking every open connection to close once its in-flight requests are
//!    answered. Idle keep-alive connections close at once.
//! 3. Waiting for those connections and for every request handler still
//!    running, so each request's log is flushed.
//! 4. Returning, which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Response, StatusCode};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use parking_lot::RwLock;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::body::{ResponseBody, request_body};
use crate::codec::{AcceptAll, JsonCodec, StructDecoder, StructEncoder, StructValidator};
use crate::config::Config;
use crate::context::Context;
use crate::error::{BoxError, Result};
use crate::group::HandlerGroup;
use crate::logger::LogSink;
use crate::request::RawRequest;
use crate::router::Router;
use crate::sink::TracingLogSink;
use crate::writer::ResponseWriter;

/// Builds the log sink for one request.
pub type LoggerFactory = Arc<dyn Fn(&Context) -> Box<dyn LogSink> + Send + Sync + 'static>;

/// Resolves the client host for [`ContextRequest::client_host`](crate::ContextRequest::client_host).
pub type ClientHost = Arc<dyn Fn(&Context) -> String + Send + Sync + 'static>;

/// The strategies every request can reach. Read-only once built.
pub(crate) struct Shared {
    pub(crate) encoder: Arc<dyn StructEncoder>,
    pub(crate) decoder: Arc<dyn StructDecoder>,
    pub(crate) validator: Arc<dyn StructValidator>,
    pub(crate) logger_factory: LoggerFactory,
    pub(crate) client_host: ClientHost,
    pub(crate) config: Config,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            encoder: Arc::new(JsonCodec),
            decoder: Arc::new(JsonCodec),
            validator: Arc::new(AcceptAll),
            logger_factory: Arc::new(|c: &Context| -> Box<dyn LogSink> {
                Box::new(TracingLogSink::for_request(c))
            }),
            client_host: Arc::new(|c: &Context| {
                c.request.remote_addr.map(|addr| addr.ip().to_string()).unwrap_or_default()
            }),
            config: Config::default(),
        }
    }
}

/// Configures the pluggable parts of a [`Server`].
///
/// Defaults: JSON encoding and decoding, a validator that accepts everything,
/// a [`TracingLogSink`] per request, and the peer IP as client host.
///
/// ```rust,no_run
/// use weft::{Server, TracingLogSink};
///
/// let server = Server::builder()
///     .request_logger(|c| Box::new(TracingLogSink::for_request(c).panic_on_fatal_bug(cfg!(debug_assertions))))
///     .client_host(|c| {
///         c.header("x-forwarded-for")
///             .and_then(|v| v.split(',').next())
///             .map(|v| v.trim().to_owned())
///             .unwrap_or_default()
///     })
///     .build();
/// ```
#[derive(Default)]
pub struct ServerBuilder {
    shared: Shared,
}

impl ServerBuilder {
    pub fn encoder(mut self, encoder: impl StructEncoder) -> Self {
        self.shared.encoder = Arc::new(encoder);
        self
    }

    pub fn decoder(mut self, decoder: impl StructDecoder) -> Self {
        self.shared.decoder = Arc::new(decoder);
        self
    }

    pub fn validator(mut self, validator: impl StructValidator) -> Self {
        self.shared.validator = Arc::new(validator);
        self
    }

    /// Sets the factory called at the start of every request for that
    /// request's log sink.
    pub fn request_logger<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Context) -> Box<dyn LogSink> + Send + Sync + 'static,
    {
        self.shared.logger_factory = Arc::new(factory);
        self
    }

    pub fn client_host<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        self.shared.client_host = Arc::new(resolve);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.shared.config = config;
        self
    }

    pub fn build(self) -> Server {
        Server {
            shared: Arc::new(self.shared),
            router: Arc::new(RwLock::new(Router::default())),
            handlers: TaskTracker::new(),
        }
    }
}

/// Owns the routing table and the request-handling strategies.
///
/// Register routes at startup through [`handler_group`](Self::handler_group),
/// then [`serve`](Self::serve). Cloning is cheap and shares both.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
    router: Arc<RwLock<Router>>,
    /// Lifecycle tasks, which outlive their connection if the client leaves.
    handlers: TaskTracker,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// A server with every strategy at its default.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns a top-level group with no middleware, rooted at `base_path`.
    pub fn handler_group(&self, base_path: &str) -> HandlerGroup {
        HandlerGroup::root(Arc::clone(&self.shared), Arc::clone(&self.router), base_path)
    }

    /// Creates a top-level group and hands it to `register`.
    pub fn add_handler_group<F>(&self, base_path: &str, register: F) -> Result<()>
    where
        F: FnOnce(&mut HandlerGroup) -> Result<()>,
    {
        register(&mut self.handler_group(base_path))
    }

    /// Routes one request and returns the response as soon as its status is
    /// written. The handler keeps running on its own task while the body
    /// streams.
    ///
    /// This is what the transport calls per request; it is public so the
    /// server can be embedded in another transport or driven from tests.
    /// Must be called within a tokio runtime.
    pub async fn call<B>(&self, req: http::Request<B>, remote_addr: Option<SocketAddr>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let route = self.router.read().lookup(&parts.method, parts.uri.path());
        let Some((endpoint, params)) = route else {
            debug!(method = %parts.method, path = parts.uri.path(), "no route");
            let mut res = Response::new(ResponseBody::empty());
            *res.status_mut() = StatusCode::NOT_FOUND;
            return res;
        };

        let (writer, pending) = ResponseWriter::channel(self.shared.config.body_buffer);
        let request = RawRequest { parts, body: request_body(body), remote_addr };
        self.handlers.spawn(endpoint(request, params, writer));
        pending.into_response().await
    }

    /// Binds `addr` and serves until SIGTERM or Ctrl-C, then drains
    /// in-flight connections.
    pub async fn serve(self, addr: impl ToSocketAddrs) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serves connections from `listener` until `signal` resolves, then
    /// closes connections gracefully and waits for running handlers.
    pub async fn serve_with_shutdown<S>(self, listener: TcpListener, signal: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        info!(addr = %listener.local_addr()?, "weft listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();
        let shutdown = CancellationToken::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let server = self.clone();
                    let shutdown = shutdown.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req: http::Request<Incoming>| {
                            let server = server.clone();
                            async move { Ok::<_, Infallible>(server.call(req, Some(remote_addr)).await) }
                        });

                        // `auto::Builder` speaks HTTP/1.1 and HTTP/2, whichever
                        // the client negotiates.
                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let mut closing = false;
                        loop {
                            tokio::select! {
                                res = conn.as_mut() => {
                                    if let Err(e) = res {
                                        error!(peer = %remote_addr, "connection error: {e}");
                                    }
                                    break;
                                }
                                () = shutdown.cancelled(), if !closing => {
                                    closing = true;
                                    conn.as_mut().graceful_shutdown();
                                }
                            }
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        shutdown.cancel();
        while tasks.join_next().await.is_some() {}

        self.handlers.close();
        self.handlers.wait().await;

        info!("weft stopped");
        Ok(())
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
