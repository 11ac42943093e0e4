//! Per-request logging facade.
//!
//! weft holds no global logger. Every request asks the server's logger
//! factory for a fresh [`LogSink`], logs into it through a [`RequestLogger`],
//! and the lifecycle flushes it exactly once when the request ends.

use std::backtrace::Backtrace;
use std::fmt;

/// The capability set a per-request log sink provides.
pub trait LogSink: Send {
    /// Useful to know, not in any way bad.
    fn info(&mut self, msg: &str);
    /// A problem that does not make the request fail.
    fn warning(&mut self, msg: &str);
    /// A problem that makes the request fail.
    fn error(&mut self, msg: &str);
    /// A condition that indicates a programming defect. Whether it also
    /// aborts the process is up to the sink.
    fn fatal_bug(&mut self, msg: &str);

    /// Renders the formatted logging variants.
    fn format_message(&self, args: fmt::Arguments<'_>) -> String {
        fmt::format(args)
    }

    /// Called once, after the request completes, to write everything
    /// collected during it.
    fn flush(&mut self);
}

/// Default bound on the stack snapshot attached to fatal-bug events.
pub const DEFAULT_STACK_TRACE_LIMIT: usize = 100_000;

/// Logs events that occur within a request.
pub struct RequestLogger {
    sink: Box<dyn LogSink>,
    stack_trace_limit: usize,
}

impl RequestLogger {
    pub fn new(sink: Box<dyn LogSink>) -> Self {
        Self { sink, stack_trace_limit: DEFAULT_STACK_TRACE_LIMIT }
    }

    pub(crate) fn with_stack_trace_limit(mut self, limit: usize) -> Self {
        self.stack_trace_limit = limit;
        self
    }

    pub fn info(&mut self, msg: &str) {
        self.sink.info(msg);
    }

    pub fn info_fmt(&mut self, args: fmt::Arguments<'_>) {
        let msg = self.sink.format_message(args);
        self.info(&msg);
    }

    pub fn warning(&mut self, msg: &str) {
        self.sink.warning(msg);
    }

    pub fn warning_fmt(&mut self, args: fmt::Arguments<'_>) {
        let msg = self.sink.format_message(args);
        self.warning(&msg);
    }

    pub fn error(&mut self, msg: &str) {
        self.sink.error(msg);
    }

    pub fn error_fmt(&mut self, args: fmt::Arguments<'_>) {
        let msg = self.sink.format_message(args);
        self.error(&msg);
    }

    /// Logs a programming defect, then the current stack as a second
    /// fatal-bug event prefixed `Stack Trace:\n`.
    pub fn fatal_bug(&mut self, msg: &str) {
        self.sink.fatal_bug(msg);
        let trace = stack_snapshot(self.stack_trace_limit);
        self.sink.fatal_bug(&format!("Stack Trace:\n{trace}"));
    }

    pub fn fatal_bug_fmt(&mut self, args: fmt::Arguments<'_>) {
        let msg = self.sink.format_message(args);
        self.fatal_bug(&msg);
    }

    pub(crate) fn flush(&mut self) {
        self.sink.flush();
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger").finish_non_exhaustive()
    }
}

fn stack_snapshot(limit: usize) -> String {
    let mut trace = Backtrace::force_capture().to_string();
    if trace.len() > limit {
        let mut end = limit;
        while !trace.is_char_boundary(end) {
            end -= 1;
        }
        trace.truncate(end);
    }
    trace
}

/// Discards everything. Stands in until the real sink is built.
pub(crate) struct NullSink;

impl LogSink for NullSink {
    fn info(&mut self, _msg: &str) {}
    fn warning(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
    fn fatal_bug(&mut self, _msg: &str) {}
    fn flush(&mut self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<(&'static str, String)>>>);

    impl LogSink for Capture {
        fn info(&mut self, msg: &str) {
            self.0.lock().unwrap().push(("info", msg.to_owned()));
        }
        fn warning(&mut self, msg: &str) {
            self.0.lock().unwrap().push(("warning", msg.to_owned()));
        }
        fn error(&mut self, msg: &str) {
            self.0.lock().unwrap().push(("error", msg.to_owned()));
        }
        fn fatal_bug(&mut self, msg: &str) {
            self.0.lock().unwrap().push(("fatal_bug", msg.to_owned()));
        }
        fn format_message(&self, args: fmt::Arguments<'_>) -> String {
            format!("[fmt] {args}")
        }
        fn flush(&mut self) {
            self.0.lock().unwrap().push(("flush", String::new()));
        }
    }

    #[test]
    fn formatted_variants_go_through_the_sink() {
        let capture = Capture::default();
        let mut log = RequestLogger::new(Box::new(capture.clone()));
        log.warning_fmt(format_args!("retry {}", 3));

        let entries = capture.0.lock().unwrap();
        assert_eq!(entries[0], ("warning", "[fmt] retry 3".to_owned()));
    }

    #[test]
    fn fatal_bug_adds_bounded_stack_trace() {
        let capture = Capture::default();
        let mut log = RequestLogger::new(Box::new(capture.clone())).with_stack_trace_limit(64);
        log.fatal_bug("impossible");

        let entries = capture.0.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("fatal_bug", "impossible".to_owned()));
        assert_eq!(entries[1].0, "fatal_bug");
        assert!(entries[1].1.starts_with("Stack Trace:\n"));
        assert!(entries[1].1.len() <= "Stack Trace:\n".len() + 64);
    }
}
