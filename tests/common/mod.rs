#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use tokio::sync::Notify;
use weft::{Context, Handler, LogSink, Middleware, ResponseBody, Server, ServerBuilder, handler_fn, middleware_fn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
    FatalBug,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<Vec<(Level, String)>>,
    flushes: Mutex<usize>,
    paths: Mutex<Vec<String>>,
    flushed: Notify,
}

/// Records everything every request logs, in order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Inner>);

struct RecordingSink(Arc<Inner>);

impl LogSink for RecordingSink {
    fn info(&mut self, msg: &str) {
        self.0.entries.lock().unwrap().push((Level::Info, msg.to_owned()));
    }
    fn warning(&mut self, msg: &str) {
        self.0.entries.lock().unwrap().push((Level::Warning, msg.to_owned()));
    }
    fn error(&mut self, msg: &str) {
        self.0.entries.lock().unwrap().push((Level::Error, msg.to_owned()));
    }
    fn fatal_bug(&mut self, msg: &str) {
        self.0.entries.lock().unwrap().push((Level::FatalBug, msg.to_owned()));
    }
    fn flush(&mut self) {
        *self.0.flushes.lock().unwrap() += 1;
        self.0.flushed.notify_waiters();
    }
}

impl Recorder {
    /// A server builder whose request logs land in this recorder.
    pub fn builder(&self) -> ServerBuilder {
        let inner = Arc::clone(&self.0);
        Server::builder().request_logger(move |c: &Context| -> Box<dyn LogSink> {
            inner.paths.lock().unwrap().push(c.path().to_owned());
            Box::new(RecordingSink(Arc::clone(&inner)))
        })
    }

    pub fn server(&self) -> Server {
        self.builder().build()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.0.entries.lock().unwrap().clone()
    }

    pub fn at(&self, level: Level) -> Vec<String> {
        self.entries().into_iter().filter(|(l, _)| *l == level).map(|(_, m)| m).collect()
    }

    pub fn flushes(&self) -> usize {
        *self.0.flushes.lock().unwrap()
    }

    /// Paths the logger factory was invoked for.
    pub fn paths(&self) -> Vec<String> {
        self.0.paths.lock().unwrap().clone()
    }

    /// Waits until `n` requests have flushed their logs.
    pub async fn wait_flushed(&self, n: usize) {
        let wait = async {
            loop {
                let notified = self.0.flushed.notified();
                if self.flushes() >= n {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("request logs were never flushed");
    }
}

pub async fn send(server: &Server, method: Method, uri: &str, body: impl Into<Bytes>) -> Response<ResponseBody> {
    let req = Request::builder().method(method).uri(uri).body(Full::new(body.into())).unwrap();
    server.call(req, Some("10.0.0.7:51000".parse().unwrap())).await
}

pub async fn get(server: &Server, uri: &str) -> Response<ResponseBody> {
    send(server, Method::GET, uri, Bytes::new()).await
}

pub async fn body_of(res: Response<ResponseBody>) -> Bytes {
    res.into_body().collect_bytes().await.unwrap()
}

/// Shared log of which layers ran, in order.
#[derive(Clone, Default)]
pub struct Trail(Arc<Mutex<Vec<String>>>);

impl Trail {
    pub fn push(&self, step: impl Into<String>) {
        self.0.lock().unwrap().push(step.into());
    }

    pub fn steps(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Middleware that records `name` on the way in and `/name` on the way out.
    pub fn marker(&self, name: &'static str) -> Middleware {
        let trail = self.clone();
        middleware_fn(move |next: Handler| {
            let trail = trail.clone();
            handler_fn(move |c| {
                let next = next.clone();
                let trail = trail.clone();
                Box::pin(async move {
                    trail.push(name);
                    let res = next(c).await;
                    trail.push(format!("/{name}"));
                    res
                })
            })
        })
    }

    /// A leaf that records `leaf` and answers 200.
    pub fn leaf(&self) -> Handler {
        let trail = self.clone();
        handler_fn(move |c| {
            let trail = trail.clone();
            Box::pin(async move {
                trail.push("leaf");
                c.response().status(http::StatusCode::OK).await
            })
        })
    }
}
