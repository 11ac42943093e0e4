//! The per-request context handed to every handler.

use std::sync::Arc;

use http::Method;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::logger::{NullSink, RequestLogger};
use crate::request::{ContextRequest, RawRequest};
use crate::response::ContextResponse;
use crate::router::Params;
use crate::scope::Scope;
use crate::server::Shared;
use crate::tracker::ResponseTracker;
use crate::writer::ResponseWriter;

/// Everything a handler needs to process one request: a [`Scope`] for
/// deadlines, cancellation, and request-scoped values, a logger, and facades
/// for reading the request and writing the response.
///
/// A context is created when a request arrives and dropped when its handler
/// chain returns. It belongs to that one request.
pub struct Context {
    /// Request-scoped values and cancellation.
    pub scope: Scope,
    pub(crate) log: RequestLogger,
    pub(crate) request: RawRequest,
    pub(crate) params: Params,
    pub(crate) response: ResponseTracker,
    pub(crate) server: Arc<Shared>,
    escape_hatch_used: bool,
}

impl Context {
    pub(crate) fn new(
        server: Arc<Shared>,
        request: RawRequest,
        params: Params,
        writer: ResponseWriter,
    ) -> Self {
        Self {
            scope: Scope::new(),
            log: RequestLogger::new(Box::new(NullSink)),
            request,
            params,
            response: ResponseTracker::new(writer),
            server,
            escape_hatch_used: false,
        }
    }

    pub fn log(&mut self) -> &mut RequestLogger {
        &mut self.log
    }

    pub fn request(&mut self) -> ContextRequest<'_> {
        ContextRequest { c: self }
    }

    pub fn response(&mut self) -> ContextResponse<'_> {
        ContextResponse { c: self }
    }

    pub fn method(&self) -> &Method {
        &self.request.parts.method
    }

    pub fn path(&self) -> &str {
        self.request.parts.uri.path()
    }

    /// A request header as text; `None` if absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The tracked response status, `0` if none was written.
    pub fn status_code(&self) -> u16 {
        self.response.status_code()
    }

    /// Body bytes written through the facade so far.
    pub fn bytes_written(&self) -> u64 {
        self.response.bytes_written()
    }

    /// Runs the server's validate strategy over `value`.
    pub fn validate_struct<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| Error::Validate(e.into()))?;
        self.server.validator.validate(self, &value).map_err(Error::Validate)
    }

    /// Hands out the raw request and response writer for work the facades do
    /// not cover.
    ///
    /// Writes made through the raw writer bypass response tracking:
    /// [`status_code`](Self::status_code) will not see them, and a later
    /// facade write fails with [`Error::StatusAlreadyWritten`]. The lifecycle
    /// consults the raw writer before reporting a missing response for a
    /// request that used the hatch.
    pub fn escape_hatch(&mut self) -> (&mut RawRequest, &mut ResponseWriter) {
        self.escape_hatch_used = true;
        (&mut self.request, self.response.raw_mut())
    }

    pub fn escape_hatch_used(&self) -> bool {
        self.escape_hatch_used
    }

    /// Whether any status went out, through the facade or the escape hatch.
    pub(crate) fn responded(&self) -> bool {
        self.response.status_code() != 0
            || (self.escape_hatch_used && self.response.raw().committed_status().is_some())
    }
}

#[cfg(test)]
impl Context {
    /// A context bound to a throwaway request and a default server.
    pub(crate) fn detached() -> Self {
        let (writer, _pending) = ResponseWriter::channel(16);
        let request = RawRequest::new(
            http::Request::new(http_body_util::Empty::<bytes::Bytes>::new()),
            None,
        );
        Self::new(Arc::new(Shared::default()), request, Params::default(), writer)
    }
}
