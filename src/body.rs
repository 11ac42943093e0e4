//! Request and response body types.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::{Body, Frame, SizeHint};
use tokio::sync::mpsc;

use crate::error::BoxError;

/// The body of an incoming request, whatever the transport produced.
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// Erases a concrete body type into a [`RequestBody`].
pub fn request_body<B>(body: B) -> RequestBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// An empty [`RequestBody`].
pub fn empty_request_body() -> RequestBody {
    request_body(http_body_util::Empty::<Bytes>::new())
}

pub(crate) type Chunk = Result<Bytes, BoxError>;

/// The body of an outgoing response.
///
/// Chunks arrive over a bounded channel from the request's
/// [`ResponseWriter`](crate::ResponseWriter) while the handler is still
/// running, so large bodies never sit in memory in full. The body ends when
/// the writer is dropped; an error chunk aborts it.
pub struct ResponseBody {
    rx: Option<mpsc::Receiver<Chunk>>,
}

impl ResponseBody {
    pub(crate) fn channel(rx: mpsc::Receiver<Chunk>) -> Self {
        Self { rx: Some(rx) }
    }

    pub fn empty() -> Self {
        Self { rx: None }
    }

    /// Reads the whole body into memory. Meant for tests and in-process
    /// callers of [`Server::call`](crate::Server::call).
    pub async fn collect_bytes(self) -> Result<Bytes, BoxError> {
        Ok(self.collect().await?.to_bytes())
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(None);
        };
        match rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(data))) => Poll::Ready(Some(Ok(Frame::data(data)))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                self.rx = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.rx.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        match self.rx {
            None => SizeHint::with_exact(0),
            Some(_) => SizeHint::default(),
        }
    }
}
