//! Direct-to-buffer RESP2 serialization.
//!
//! [`encode_command`] writes the client → server "multi-bulk" form: an
//! array of bulk strings, one per argument. [`Value::serialize`] writes
//! any value in its wire form; it exists for symmetry and for test
//! harnesses that play the server side of the conversation.
//!
//! Integer-to-string conversion uses `itoa` for stack-based formatting.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::Value;

/// Encodes a command as `*N\r\n` followed by `$len\r\n<bytes>\r\n` per
/// argument. Lengths are exact byte counts of the payload.
///
/// The argv must be non-empty with the verb first; the encoder does not
/// enforce this — command builders do.
pub fn encode_command(argv: &[Bytes], dst: &mut BytesMut) {
    dst.put_u8(b'*');
    put_i64(argv.len() as i64, dst);
    dst.put_slice(b"\r\n");
    for arg in argv {
        dst.put_u8(b'$');
        put_i64(arg.len() as i64, dst);
        dst.put_slice(b"\r\n");
        dst.put_slice(arg);
        dst.put_slice(b"\r\n");
    }
}

impl Value {
    /// Serializes this value into the buffer, including the type prefix
    /// and CRLF terminators.
    ///
    /// `Null` and `Bulk(None)` both produce the null bulk `$-1\r\n`;
    /// `Array(None)` produces the null array `*-1\r\n`.
    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Value::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Value::Error(msg) => {
                dst.put_u8(b'-');
                dst.put_slice(msg.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Value::Integer(n) => {
                dst.put_u8(b':');
                put_i64(*n, dst);
                dst.put_slice(b"\r\n");
            }
            Value::Bulk(Some(data)) => {
                dst.put_u8(b'$');
                put_i64(data.len() as i64, dst);
                dst.put_slice(b"\r\n");
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Value::Bulk(None) | Value::Null => {
                dst.put_slice(b"$-1\r\n");
            }
            Value::Array(Some(items)) => {
                dst.put_u8(b'*');
                put_i64(items.len() as i64, dst);
                dst.put_slice(b"\r\n");
                for item in items {
                    item.serialize(dst);
                }
            }
            Value::Array(None) => {
                dst.put_slice(b"*-1\r\n");
            }
        }
    }
}

/// Writes an i64 as decimal ASCII directly into the buffer.
fn put_i64(val: i64, dst: &mut BytesMut) {
    let mut buf = itoa::Buffer::new();
    dst.put_slice(buf.format(val).as_bytes());
}
