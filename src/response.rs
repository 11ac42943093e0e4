//! The response-writing facade.
//!
//! Every operation writes through the request's response tracker, so the
//! lifecycle can tell afterwards whether, and with what status, the handler
//! answered.

use std::io::SeekFrom;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::context::Context;
use crate::error::{Error, Result};

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ContextResponse::content_type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }

    fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── ContextResponse ───────────────────────────────────────────────────────────

/// Writes the response for the request a [`Context`] is handling.
///
/// A short-lived view obtained via [`Context::response`]. Each operation
/// consumes it:
///
/// ```rust,ignore
/// c.response().header().insert("cache-control", "no-store".parse()?);
/// c.response().string(StatusCode::OK, "hello").await
/// ```
///
/// Every body-writing operation sends a status. Calling a second one for
/// the same request fails with [`Error::StatusAlreadyWritten`].
pub struct ContextResponse<'a> {
    pub(crate) c: &'a mut Context,
}

impl<'a> ContextResponse<'a> {
    /// The response headers. Changes made after a status was written are not
    /// sent.
    pub fn header(self) -> &'a mut HeaderMap {
        self.c.response.headers_mut()
    }

    /// Sets `Content-Type`, replacing any earlier value.
    pub fn content_type(self, content_type: ContentType) -> Self {
        self.c.response.headers_mut().insert(CONTENT_TYPE, content_type.header_value());
        self
    }

    /// The status written so far, `0` if none. Middleware uses this to tell
    /// whether an inner handler already answered.
    pub fn status_code(self) -> u16 {
        self.c.response.status_code()
    }

    /// Responds with `status` and no body.
    pub async fn status(self, status: StatusCode) -> Result<()> {
        self.ensure_unwritten()?;
        self.c.response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(0u64));
        self.c.response.write_head(status)
    }

    /// Responds with `status` and `body`. `Content-Type` defaults to
    /// `application/octet-stream` when the handler has not set one.
    pub async fn bytes(self, status: StatusCode, body: impl Into<Bytes>) -> Result<()> {
        self.write_full(status, ContentType::OctetStream, body.into()).await
    }

    /// Responds with `status` and `body`. `Content-Type` defaults to
    /// `text/plain; charset=utf-8` when the handler has not set one.
    pub async fn string(self, status: StatusCode, body: impl Into<String>) -> Result<()> {
        self.write_full(status, ContentType::Text, Bytes::from(body.into())).await
    }

    /// Responds with `status` and `value` serialised by the server's encode
    /// strategy. The status is written before encoding, so an encode failure
    /// leaves a headers-only response behind.
    pub async fn struct_<T: Serialize + ?Sized>(self, status: StatusCode, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| Error::Encode(e.into()))?;
        self.ensure_unwritten()?;
        self.c.response.write_head(status)?;

        let mut buf = Vec::new();
        let encoded = self.c.server.encoder.encode(&*self.c, &value, &mut buf);
        encoded.map_err(Error::Encode)?;
        self.c.response.write(Bytes::from(buf)).await.map_err(Error::Write)?;
        Ok(())
    }

    /// Responds with `status`, then copies `stream` into the body until it is
    /// exhausted. No `Content-Length` is set unless the handler set one; the
    /// transport frames the body.
    pub async fn stream<R>(self, status: StatusCode, mut stream: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.ensure_unwritten()?;
        self.c.response.write_head(status)?;

        let chunk_size = self.c.server.config.stream_chunk_size.max(1);
        let mut buf = BytesMut::with_capacity(chunk_size);
        loop {
            buf.reserve(chunk_size);
            match stream.read_buf(&mut buf).await {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    let chunk = buf.split().freeze();
                    self.c.response.write(chunk).await.map_err(Error::Write)?;
                }
                Err(e) => {
                    self.c.response.abort(format!("body stream failed: {e}")).await;
                    return Err(Error::Write(e));
                }
            }
        }
    }

    /// Like [`stream`](Self::stream), but first measures the remaining length
    /// so `Content-Length` can be set exactly.
    ///
    /// If the length cannot be measured, a warning is logged and the body is
    /// streamed unmeasured. If it was measured but the original position
    /// cannot be restored, the request fails with [`Error::StreamLength`].
    pub async fn stream_read_seeker<R>(self, status: StatusCode, mut stream: R) -> Result<()>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let current = match stream.seek(SeekFrom::Current(0)).await {
            Ok(pos) => pos,
            Err(e) => {
                self.c.log.warning_fmt(format_args!("Unable to determine current stream position: {e}"));
                self.c.log.info("Falling back to chunked streaming");
                return self.stream(status, stream).await;
            }
        };
        let end = match stream.seek(SeekFrom::End(0)).await {
            Ok(pos) => pos,
            Err(e) => {
                self.c.log.warning_fmt(format_args!("Unable to determine total stream length: {e}"));
                self.c.log.info("Falling back to chunked streaming");
                return self.stream(status, stream).await;
            }
        };
        if let Err(e) = stream.seek(SeekFrom::Start(current)).await {
            self.c.log.error_fmt(format_args!("Unable to restore stream position after reading length: {e}"));
            return Err(Error::StreamLength(e));
        }

        let len = end.saturating_sub(current);
        self.c.response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
        self.stream(status, stream).await
    }

    /// Responds with `status` and the contents of the file at `path`. The
    /// file is closed on every path out of this call.
    pub async fn file(self, status: StatusCode, path: impl AsRef<Path>) -> Result<()> {
        let file = tokio::fs::File::open(path).await.map_err(Error::FileOpen)?;
        self.stream_read_seeker(status, file).await
    }

    async fn write_full(self, status: StatusCode, default_type: ContentType, body: Bytes) -> Result<()> {
        self.ensure_unwritten()?;
        let headers = self.c.response.headers_mut();
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, default_type.header_value());
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.c.response.write_head(status)?;
        self.c.response.write(body).await.map_err(Error::Write)?;
        Ok(())
    }

    fn ensure_unwritten(&self) -> Result<()> {
        match self.c.response.status_code() {
            0 => Ok(()),
            prior => Err(Error::StatusAlreadyWritten(prior)),
        }
    }
}
