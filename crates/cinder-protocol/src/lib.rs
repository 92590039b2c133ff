//! cinder-protocol: RESP2 wire protocol implementation.
//!
//! Incremental decoding of server replies and direct-to-buffer encoding
//! of client commands, shared by the `cinder` client crate.
//!
//! # quick start
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use cinder_protocol::{encode_command, Decoder, Value};
//!
//! // encode a command
//! let argv = vec![Bytes::from_static(b"PING")];
//! let mut out = BytesMut::new();
//! encode_command(&argv, &mut out);
//! assert_eq!(&out[..], b"*1\r\n$4\r\nPING\r\n");
//!
//! // decode a reply, fed in arbitrary chunks
//! let mut dec = Decoder::new();
//! dec.feed(b"+PO");
//! assert_eq!(dec.decode().unwrap(), None);
//! dec.feed(b"NG\r\n");
//! assert_eq!(dec.decode().unwrap(), Some(Value::Simple("PONG".into())));
//! ```

pub mod decode;
mod encode;
pub mod error;
pub mod types;

pub use decode::Decoder;
pub use encode::encode_command;
pub use error::ProtocolError;
pub use types::Value;
