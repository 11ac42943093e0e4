//! Incoming request: the raw form and the reading facade.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use http_body_util::BodyExt;
use hyper::body::Body;
use serde::de::DeserializeOwned;

use crate::body::{RequestBody, empty_request_body, request_body};
use crate::context::Context;
use crate::error::{BoxError, Error, Result};
use crate::router::Params;

/// The request as the transport delivered it.
pub struct RawRequest {
    pub parts: http::request::Parts,
    pub body: RequestBody,
    pub remote_addr: Option<SocketAddr>,
}

impl RawRequest {
    pub fn new<B>(req: http::Request<B>, remote_addr: Option<SocketAddr>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        Self { parts, body: request_body(body), remote_addr }
    }

    /// Takes the body, leaving an empty one behind.
    pub fn take_body(&mut self) -> RequestBody {
        std::mem::replace(&mut self.body, empty_request_body())
    }
}

/// Reads the request a [`Context`] is handling.
///
/// A short-lived view obtained via [`Context::request`]; each method consumes
/// it, so borrowed results live as long as the context borrow:
///
/// ```rust,ignore
/// let id = c.request().param("id").unwrap_or_default().to_owned();
/// let body: NewItem = c.request().body_struct().await?;
/// ```
pub struct ContextRequest<'a> {
    pub(crate) c: &'a mut Context,
}

impl<'a> ContextRequest<'a> {
    /// The client's host or IP, as resolved by the server's client-host
    /// strategy. Defaults to the peer IP; behind a proxy, configure a
    /// strategy that reads the forwarding header.
    pub fn client_host(self) -> String {
        (self.c.server.client_host)(&*self.c)
    }

    pub fn method(self) -> &'a Method {
        &self.c.request.parts.method
    }

    pub fn uri(self) -> &'a Uri {
        &self.c.request.parts.uri
    }

    pub fn header(self) -> &'a mut HeaderMap {
        &mut self.c.request.parts.headers
    }

    pub fn params(self) -> &'a Params {
        &self.c.params
    }

    /// Shorthand for `params().get(name)`.
    pub fn param(self, name: &str) -> Option<&'a str> {
        self.c.params.get(name)
    }

    /// Takes the body for streaming. Later body reads see an empty body.
    pub fn body_stream(self) -> RequestBody {
        self.c.request.take_body()
    }

    pub async fn body_bytes(self) -> Result<Bytes> {
        let body = self.c.request.take_body();
        let collected = body.collect().await.map_err(Error::Body)?;
        Ok(collected.to_bytes())
    }

    /// The body as UTF-8, with invalid sequences replaced.
    pub async fn body_string(self) -> Result<String> {
        let bytes = self.body_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the body and deserialises it with the server's decode strategy.
    pub async fn body_struct<T: DeserializeOwned>(self) -> Result<T> {
        let c = self.c;
        let bytes = ContextRequest { c: &mut *c }.body_bytes().await?;
        let value = c.server.decoder.decode(&*c, &bytes).map_err(Error::Decode)?;
        serde_json::from_value(value).map_err(|e| Error::Decode(e.into()))
    }
}
