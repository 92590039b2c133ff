//! RESP2 protocol values.
//!
//! [`Value`] represents a single decoded RESP2 reply. Bulk payloads use
//! `Bytes` for reference-counted storage that avoids copies when values
//! move from the read buffer through the pipeline to the caller.

use bytes::Bytes;

/// A single RESP2 protocol value.
///
/// RESP2 has two distinct null encodings on the wire — the null bulk
/// string `$-1\r\n` and the null array `*-1\r\n` — which appear here as
/// `Bulk(None)` and `Array(None)`. [`Value::Null`] is the client-side
/// logical null used when building values by hand; all three spellings
/// answer `true` to [`Value::is_null`] and serialize as a null bulk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Simple string reply, e.g. `+OK\r\n`. Short, never contains CR/LF.
    Simple(String),

    /// Error reply, e.g. `-ERR unknown command\r\n`. A semantic
    /// "command failed" signal; not fatal to the connection.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Binary-safe bulk string, e.g. `$5\r\nhello\r\n`.
    /// `None` is the null-bulk sentinel `$-1\r\n`.
    Bulk(Option<Bytes>),

    /// Ordered array of values, e.g. `*2\r\n:1\r\n:2\r\n`.
    /// `None` is the null-array sentinel `*-1\r\n`.
    Array(Option<Vec<Value>>),

    /// Logical null. Never produced by the decoder (which yields the
    /// wire-accurate `Bulk(None)` / `Array(None)` instead).
    Null,
}

impl Value {
    /// Builds a bulk string value from anything byte-like.
    pub fn bulk(data: impl Into<Bytes>) -> Value {
        Value::Bulk(Some(data.into()))
    }

    /// Builds an array value from its items.
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Some(items))
    }

    /// Returns `true` for any of the three null spellings.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Bulk(None) | Value::Array(None))
    }

    /// Short name of the wire shape, used in decode error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Simple(_) => "simple string",
            Value::Error(_) => "error",
            Value::Integer(_) => "integer",
            Value::Bulk(Some(_)) => "bulk string",
            Value::Bulk(None) => "null bulk string",
            Value::Array(Some(_)) => "array",
            Value::Array(None) => "null array",
            Value::Null => "null",
        }
    }
}
