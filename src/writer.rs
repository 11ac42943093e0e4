//! The raw response sink handed to every request.
//!
//! A [`ResponseWriter`] has the shape of a classic server response writer:
//! mutable headers, a one-time status line, then body chunks. Behind it sit
//! two channels. The status and headers go out on a oneshot the moment they
//! are written, which is what lets the transport start answering while the
//! handler keeps streaming body chunks over the second, bounded channel.

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use tokio::sync::{mpsc, oneshot};

use crate::body::{Chunk, ResponseBody};
use crate::error::BoxError;

type Head = (StatusCode, HeaderMap);

/// The untracked response writer.
///
/// Normally reached through the [`Context`](crate::Context) facade; handed
/// out directly only by [`Context::escape_hatch`](crate::Context::escape_hatch).
pub struct ResponseWriter {
    headers: HeaderMap,
    head: Option<oneshot::Sender<Head>>,
    committed: Option<StatusCode>,
    body: mpsc::Sender<Chunk>,
}

/// The receiving half of a [`ResponseWriter`], held by the transport.
pub struct PendingResponse {
    head: oneshot::Receiver<Head>,
    body: mpsc::Receiver<Chunk>,
}

impl ResponseWriter {
    /// Creates a writer and the pending response it feeds. `capacity` bounds
    /// how many body chunks may be in flight before writes wait.
    pub fn channel(capacity: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        let writer = Self {
            headers: HeaderMap::new(),
            head: Some(head_tx),
            committed: None,
            body: body_tx,
        };
        (writer, PendingResponse { head: head_rx, body: body_rx })
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Headers changed after the status was written are not sent.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The status that went out, if any.
    pub fn committed_status(&self) -> Option<StatusCode> {
        self.committed
    }

    /// Sends the status line and the current headers. Returns `false`, and
    /// sends nothing, if a status already went out.
    pub fn write_head(&mut self, status: StatusCode) -> bool {
        let Some(tx) = self.head.take() else {
            return false;
        };
        self.committed = Some(status);
        // A closed receiver means the client is gone; body writes will report it.
        let _ = tx.send((status, std::mem::take(&mut self.headers)));
        true
    }

    /// Sends one body chunk, writing a `200 OK` status first if none was
    /// written yet.
    pub async fn write(&mut self, chunk: Bytes) -> std::io::Result<()> {
        if self.head.is_some() {
            self.write_head(StatusCode::OK);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.body.send(Ok(chunk)).await.map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "response body receiver closed")
        })
    }

    /// Ends the body with an error so the transport aborts the response
    /// instead of presenting a truncated body as complete.
    pub async fn abort(&mut self, err: impl Into<BoxError>) {
        if self.head.is_some() {
            return;
        }
        let _ = self.body.send(Err(err.into())).await;
    }
}

impl PendingResponse {
    /// Waits for the status line. If the writer is dropped without writing
    /// one, the transport default applies: an empty `200 OK`.
    pub async fn into_response(self) -> Response<ResponseBody> {
        match self.head.await {
            Ok((status, headers)) => {
                let mut res = Response::new(ResponseBody::channel(self.body));
                *res.status_mut() = status;
                *res.headers_mut() = headers;
                res
            }
            Err(_) => Response::new(ResponseBody::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn head_is_sent_once() {
        let (mut w, pending) = ResponseWriter::channel(4);
        w.headers_mut().insert("x-one", "1".parse().unwrap());
        assert!(w.write_head(StatusCode::CREATED));
        assert!(!w.write_head(StatusCode::OK));
        drop(w);

        let res = pending.into_response().await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()["x-one"], "1");
    }

    #[tokio::test]
    async fn write_without_head_implies_ok() {
        let (mut w, pending) = ResponseWriter::channel(4);
        let task = tokio::spawn(async move {
            w.write(Bytes::from_static(b"hi")).await.unwrap();
            w.committed_status()
        });

        let res = pending.into_response().await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.into_body().collect_bytes().await.unwrap(), "hi");
        assert_eq!(task.await.unwrap(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn dropped_writer_falls_back_to_empty_ok() {
        let (w, pending) = ResponseWriter::channel(1);
        drop(w);
        let res = pending.into_response().await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.into_body().collect_bytes().await.unwrap().is_empty());
    }
}
