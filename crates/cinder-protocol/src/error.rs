//! Protocol error types for RESP2 decoding.

use thiserror::Error;

/// Errors raised while decoding the RESP2 wire format.
///
/// Everything except [`ProtocolError::Incomplete`] means framing has been
/// lost: the decoder cannot resynchronise and the connection must be torn
/// down by the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer doesn't hold a complete syntactic unit yet.
    /// Internal to the decoder; surfaced to callers as "no value yet".
    #[error("incomplete frame: need more data")]
    Incomplete,

    /// The first byte of a value didn't match any RESP2 type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// A length or integer line failed to parse as a signed decimal.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string or array declared a negative length other than the
    /// `-1` null sentinel.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    /// A bulk string declared a length beyond the protocol limit.
    /// Rejected before any allocation happens.
    #[error("bulk string of {0} bytes exceeds the protocol limit")]
    BulkTooLarge(usize),

    /// An array declared more elements than the protocol limit.
    #[error("array of {0} elements exceeds the protocol limit")]
    TooManyElements(usize),

    /// Arrays nested beyond the supported depth.
    #[error("nesting exceeds the supported depth of {0}")]
    NestingTooDeep(usize),

    /// A simple string or error payload wasn't valid UTF-8.
    #[error("invalid utf-8 in {0} payload")]
    InvalidUtf8(&'static str),

    /// A bulk string payload wasn't terminated by CRLF.
    #[error("missing CRLF after bulk payload")]
    MissingCrlf,
}
