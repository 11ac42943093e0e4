//! Observation layer over the raw response writer.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::error::{Error, Result};
use crate::writer::ResponseWriter;

/// Records the status and body size of a response as it is written.
///
/// Writes pass through unchanged, with one exception: a second status write
/// is refused with [`Error::StatusAlreadyWritten`].
pub(crate) struct ResponseTracker {
    raw: ResponseWriter,
    status: u16,
    written: u64,
}

impl ResponseTracker {
    pub(crate) fn new(raw: ResponseWriter) -> Self {
        Self { raw, status: 0, written: 0 }
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        self.raw.headers_mut()
    }

    pub(crate) fn write_head(&mut self, status: StatusCode) -> Result<()> {
        if self.status != 0 {
            return Err(Error::StatusAlreadyWritten(self.status));
        }
        if !self.raw.write_head(status) {
            // Written through the escape hatch.
            let prior = self.raw.committed_status().map_or(0, |s| s.as_u16());
            return Err(Error::StatusAlreadyWritten(prior));
        }
        self.status = status.as_u16();
        Ok(())
    }

    pub(crate) async fn write(&mut self, chunk: Bytes) -> std::io::Result<usize> {
        let n = chunk.len();
        self.raw.write(chunk).await?;
        self.written += n as u64;
        Ok(n)
    }

    pub(crate) async fn abort(&mut self, err: impl Into<crate::error::BoxError>) {
        self.raw.abort(err).await;
    }

    /// The tracked status, `0` until one is written.
    pub(crate) fn status_code(&self) -> u16 {
        self.status
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.written
    }

    pub(crate) fn raw(&self) -> &ResponseWriter {
        &self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut ResponseWriter {
        &mut self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_status_and_bytes() {
        let (raw, _pending) = ResponseWriter::channel(8);
        let mut t = ResponseTracker::new(raw);
        assert_eq!(t.status_code(), 0);

        t.write_head(StatusCode::ACCEPTED).unwrap();
        t.write(Bytes::from_static(b"abc")).await.unwrap();
        t.write(Bytes::from_static(b"de")).await.unwrap();

        assert_eq!(t.status_code(), 202);
        assert_eq!(t.bytes_written(), 5);
    }

    #[tokio::test]
    async fn body_bytes_alone_do_not_set_the_tracked_status() {
        let (raw, _pending) = ResponseWriter::channel(8);
        let mut t = ResponseTracker::new(raw);
        t.write(Bytes::from_static(b"abc")).await.unwrap();

        assert_eq!(t.status_code(), 0);
        assert_eq!(t.bytes_written(), 3);
        assert_eq!(t.raw().committed_status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn second_status_is_refused() {
        let (raw, _pending) = ResponseWriter::channel(1);
        let mut t = ResponseTracker::new(raw);
        t.write_head(StatusCode::OK).unwrap();

        let err = t.write_head(StatusCode::NOT_FOUND).unwrap_err();
        assert!(matches!(err, Error::StatusAlreadyWritten(200)));
        assert_eq!(t.status_code(), 200);
    }

    #[tokio::test]
    async fn status_written_behind_its_back_is_reported() {
        let (raw, _pending) = ResponseWriter::channel(1);
        let mut t = ResponseTracker::new(raw);
        t.raw_mut().write_head(StatusCode::IM_A_TEAPOT);

        assert_eq!(t.status_code(), 0);
        let err = t.write_head(StatusCode::OK).unwrap_err();
        assert!(matches!(err, Error::StatusAlreadyWritten(418)));
    }
}
