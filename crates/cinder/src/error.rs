//! Client error types.
//!
//! Three categories with different blast radius:
//!
//! - [`Error::Server`] — the server answered a command with a RESP error
//!   frame. Fails that command only; the connection stays healthy.
//! - [`Error::Decode`] — the reply arrived but couldn't be converted to
//!   the requested type. Fails that command only.
//! - everything else — framing or transport trouble. Fatal: every
//!   pending command fails with the same error and the connection closes.
//!
//! `Error` is `Clone` (I/O errors held behind `Arc`) so a connection
//! teardown can fail every queued completion with one error value.

use std::sync::Arc;

use cinder_protocol::ProtocolError;
use thiserror::Error;

/// Any failure surfaced to a caller of the client.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// The server replied with an error frame. The payload is the
    /// server's message text, e.g. `ERR value is not an integer`.
    #[error("server error: {0}")]
    Server(String),

    /// A reply could not be decoded into the requested type.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The inbound byte stream violated RESP2 framing. Fatal.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The transport failed. Fatal.
    #[error("io error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// A reply arrived with no outstanding command to match it. The
    /// FIFO pairing is broken, so this is fatal.
    #[error("reply received with no outstanding command")]
    UnexpectedReply,

    /// A pipeline-mode switch was attempted while commands were still
    /// in flight. The FIFO can only move between modes while empty.
    #[error("mode switch attempted with commands in flight")]
    InvalidModeSwitch,

    /// The connection is closed; the command was never sent.
    #[error("connection closed")]
    ConnectionClosed,

    /// The command is not in the Pub/Sub whitelist and the connection
    /// is in subscriber mode.
    #[error("command '{0}' is not permitted while subscribed")]
    NotPermittedWhileSubscribed(String),

    /// An unsubscribe was issued on a connection that isn't in
    /// subscriber mode.
    #[error("connection is not in subscriber mode")]
    NotSubscribed,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(Arc::new(e))
    }
}

impl Error {
    /// Whether this error poisons the whole connection (as opposed to
    /// failing a single command).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_)
                | Error::Io(_)
                | Error::UnexpectedReply
                | Error::InvalidModeSwitch
                | Error::ConnectionClosed
        )
    }
}

/// A typed-decode failure: the wire value was well-formed RESP2 but
/// doesn't have the shape the caller asked for.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// An aggregate reply was shorter than the decoder expected.
    #[error("aggregate reply ended before index {index}")]
    IndexOutOfRange { index: usize },

    /// A labelled-field reply carried the wrong key at a known offset.
    #[error("expected key '{expected}' but found '{actual}'")]
    KeyMismatch { expected: String, actual: String },

    /// The wire shape cannot produce the target type.
    #[error("cannot decode {got} as {expected}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// A failure inside an aggregate decoder, wrapping the element's
    /// own error.
    #[error("while decoding {expected} from {got}: {cause}")]
    Composite {
        expected: &'static str,
        got: &'static str,
        cause: Box<DecodeError>,
    },
}
