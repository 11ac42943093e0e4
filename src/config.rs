//! Server tuning knobs.

use serde::Deserialize;

use crate::logger::DEFAULT_STACK_TRACE_LIMIT;

/// Tuning for request handling. Every field has a default, so a partial
/// config file deserialises cleanly.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Body chunks a handler may queue before writes wait for the client.
    pub body_buffer: usize,
    /// Read buffer size when copying a stream into a response body.
    pub stream_chunk_size: usize,
    /// Upper bound, in bytes, on the stack trace attached to fatal-bug logs.
    pub stack_trace_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            body_buffer: 16,
            stream_chunk_size: 32 * 1024,
            stack_trace_limit: DEFAULT_STACK_TRACE_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "stream_chunk_size": 1024 }"#).unwrap();
        assert_eq!(cfg.stream_chunk_size, 1024);
        assert_eq!(cfg.body_buffer, Config::default().body_buffer);
        assert_eq!(cfg.stack_trace_limit, 100_000);
    }
}
