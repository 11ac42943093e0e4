//! The default log sink: buffer per request, emit through `tracing`.

use http::Method;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::logger::LogSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Level {
    Info,
    Warning,
    Error,
    FatalBug,
}

/// Collects a request's log entries and writes them as `tracing` events on
/// flush, each tagged with the request's method and path.
///
/// Buffering keeps one request's lines together in the output even when many
/// requests interleave.
#[derive(Debug)]
pub struct TracingLogSink {
    method: Method,
    path: String,
    entries: Vec<(Level, String)>,
    panic_on_fatal_bug: bool,
}

impl TracingLogSink {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), entries: Vec::new(), panic_on_fatal_bug: false }
    }

    /// Builds a sink for the request `c` is handling. This is the server's
    /// default logger factory.
    pub fn for_request(c: &Context) -> Self {
        Self::new(c.method().clone(), c.path())
    }

    /// Panic at flush time if a fatal bug was logged, after the entries are
    /// written. Intended for development builds.
    pub fn panic_on_fatal_bug(mut self, enabled: bool) -> Self {
        self.panic_on_fatal_bug = enabled;
        self
    }

    fn push(&mut self, level: Level, msg: &str) {
        self.entries.push((level, msg.to_owned()));
    }
}

impl LogSink for TracingLogSink {
    fn info(&mut self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn warning(&mut self, msg: &str) {
        self.push(Level::Warning, msg);
    }

    fn error(&mut self, msg: &str) {
        self.push(Level::Error, msg);
    }

    fn fatal_bug(&mut self, msg: &str) {
        self.push(Level::FatalBug, msg);
    }

    fn flush(&mut self) {
        let method = self.method.as_str();
        let path = self.path.as_str();
        let mut fatal = false;
        for (level, msg) in self.entries.drain(..) {
            match level {
                Level::Info => info!(method, path, "{msg}"),
                Level::Warning => warn!(method, path, "{msg}"),
                Level::Error => error!(method, path, "{msg}"),
                Level::FatalBug => {
                    fatal = true;
                    error!(method, path, fatal_bug = true, "{msg}");
                }
            }
        }
        if fatal && self.panic_on_fatal_bug {
            panic!("fatal bug logged while handling {method} {path}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_drains_entries() {
        let mut sink = TracingLogSink::new(Method::GET, "/x");
        sink.info("a");
        sink.fatal_bug("b");
        sink.flush();
        assert!(sink.entries.is_empty());
    }

    #[test]
    #[should_panic(expected = "fatal bug logged while handling GET /x")]
    fn development_mode_panics_after_flushing() {
        let mut sink = TracingLogSink::new(Method::GET, "/x").panic_on_fatal_bug(true);
        sink.fatal_bug("b");
        sink.flush();
    }
}
