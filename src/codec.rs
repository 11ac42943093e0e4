//! Pluggable struct encoding, decoding, and validation.
//!
//! weft does not pick a wire format. Typed values cross the strategy
//! boundary as [`serde_json::Value`], serde's self-describing data model, so
//! the strategies stay object-safe and any serde format can sit behind them.

use serde_json::Value;

use crate::context::Context;
use crate::error::BoxError;

/// Serialises response bodies for [`ContextResponse::struct_`](crate::ContextResponse::struct_).
pub trait StructEncoder: Send + Sync + 'static {
    /// Writes the encoded form of `value` to `out`.
    fn encode(&self, c: &Context, value: &Value, out: &mut Vec<u8>) -> Result<(), BoxError>;
}

/// Deserialises request bodies for [`ContextRequest::body_struct`](crate::ContextRequest::body_struct).
pub trait StructDecoder: Send + Sync + 'static {
    fn decode(&self, c: &Context, input: &[u8]) -> Result<Value, BoxError>;
}

/// Checks a value before the application trusts it.
pub trait StructValidator: Send + Sync + 'static {
    fn validate(&self, c: &Context, value: &Value) -> Result<(), BoxError>;
}

/// JSON via `serde_json`. The server's default encoder and decoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl StructEncoder for JsonCodec {
    fn encode(&self, _c: &Context, value: &Value, out: &mut Vec<u8>) -> Result<(), BoxError> {
        serde_json::to_writer(out, value)?;
        Ok(())
    }
}

impl StructDecoder for JsonCodec {
    fn decode(&self, _c: &Context, input: &[u8]) -> Result<Value, BoxError> {
        Ok(serde_json::from_slice(input)?)
    }
}

/// Accepts everything. The server's default validator.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl StructValidator for AcceptAll {
    fn validate(&self, _c: &Context, _value: &Value) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<F> StructValidator for F
where
    F: Fn(&Context, &Value) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn validate(&self, c: &Context, value: &Value) -> Result<(), BoxError> {
        self(c, value)
    }
}
