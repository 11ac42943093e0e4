//! Unified error type.

use thiserror::Error;

/// A boxed, thread-safe error. Handlers and pluggable strategies use it for
/// failures weft does not know the shape of.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shorthand used across the crate and by handlers.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by weft's fallible operations.
///
/// None of these tear down the server. Errors returned from a handler are
/// logged at error level by the request lifecycle and go no further.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write body: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to open file: {0}")]
    FileOpen(#[source] std::io::Error),

    /// The stream could be measured but its position could not be restored.
    #[error("failed to safely determine stream length - aborting")]
    StreamLength(#[source] std::io::Error),

    #[error("failed to read request body: {0}")]
    Body(#[source] BoxError),

    #[error("failed to encode struct: {0}")]
    Encode(#[source] BoxError),

    #[error("failed to decode struct: {0}")]
    Decode(#[source] BoxError),

    #[error("validation failed: {0}")]
    Validate(#[source] BoxError),

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// A response status was already sent for this request.
    #[error("response status already written ({0})")]
    StatusAlreadyWritten(u16),

    /// Anything a handler wants to report.
    #[error(transparent)]
    Handler(BoxError),
}

impl Error {
    /// Wraps an arbitrary error so a handler can return it with `?`-friendly
    /// `.map_err(Error::handler)`.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// A handler error carrying only a message.
    pub fn msg(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Self::Handler(msg.into())
    }
}
