//! Incremental RESP2 decoder.
//!
//! [`Decoder`] accepts arbitrary byte chunks — any chunk may split a
//! value, a line, or a length prefix — and yields fully formed [`Value`]s
//! as they complete. Unconsumed trailing bytes are retained across calls.
//!
//! # Resumable parsing
//!
//! The decoder keeps a stack of partially filled arrays: an array whose
//! element count is known but whose elements haven't all arrived yet.
//! Completed elements are moved onto the stack and their bytes released
//! from the buffer immediately, so a large pipelined reply never needs to
//! be re-scanned from the start when the next chunk lands. A syntactic
//! unit (one scalar line, one bulk string, one array header) is only
//! consumed once it is fully present; a partial unit leaves the buffer
//! untouched.
//!
//! # Zero-copy bulk strings
//!
//! Bulk payloads are split out of the internal `BytesMut` and frozen, so
//! the bytes handed to the caller share the read buffer's allocation
//! instead of being copied.

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;
use crate::types::Value;

/// Maximum length of a bulk string in bytes (512 MB, matching Redis).
/// Checked against the declared length before any allocation.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Maximum number of elements in a single array. Prevents memory
/// amplification where tiny elements declare a disproportionately large
/// allocation.
const MAX_ARRAY_ELEMENTS: usize = 1_048_576;

/// Maximum nesting depth for arrays. Bounds the partial-frame stack.
const MAX_NESTING_DEPTH: usize = 64;

/// Cap for `Vec::with_capacity` when an array header arrives. The vector
/// still grows to the declared count; this only limits the upfront
/// reservation a hostile header can force.
const PREALLOC_CAP: usize = 1024;

/// A partially decoded array: the element count is known, not all
/// elements have arrived yet.
#[derive(Debug)]
struct PartialArray {
    remaining: usize,
    items: Vec<Value>,
}

/// One complete syntactic unit scanned from the front of the buffer.
enum Unit {
    /// A finished scalar or null-sentinel value.
    Value(Value),
    /// An array header `*N\r\n` with N > 0; elements follow.
    ArrayHeader(usize),
    /// A bulk string whose payload is fully buffered. `header_len` covers
    /// `$<len>\r\n`; the payload and trailing CRLF follow it.
    Bulk { header_len: usize, payload_len: usize },
}

/// Streaming RESP2 decoder with a resumable cursor.
///
/// Feed bytes with [`Decoder::feed`] (or read directly into
/// [`Decoder::buffer_mut`]), then call [`Decoder::decode`] until it
/// returns `Ok(None)`.
///
/// A protocol error poisons the connection: framing has been lost and
/// the decoder cannot resynchronise, so the caller must tear the
/// transport down.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: BytesMut,
    stack: Vec<PartialArray>,
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder::with_capacity(4096)
    }

    /// Creates a decoder whose buffer starts at the given capacity.
    pub fn with_capacity(capacity: usize) -> Decoder {
        Decoder {
            buf: BytesMut::with_capacity(capacity),
            stack: Vec::new(),
        }
    }

    /// Appends a chunk of bytes from the transport.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// The internal buffer, exposed so a read loop can `read_buf`
    /// straight into it without an intermediate copy.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decodes the next complete value, if the buffer holds one.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Call repeatedly
    /// after each feed: a single chunk may complete several values.
    pub fn decode(&mut self) -> Result<Option<Value>, ProtocolError> {
        loop {
            let (unit, consumed) = {
                let mut scan = Scan::new(&self.buf);
                match scan_unit(&mut scan, self.stack.len()) {
                    Ok(unit) => (unit, scan.pos),
                    Err(ProtocolError::Incomplete) => return Ok(None),
                    Err(e) => return Err(e),
                }
            };

            let value = match unit {
                Unit::Value(v) => {
                    self.buf.advance(consumed);
                    v
                }
                Unit::Bulk {
                    header_len,
                    payload_len,
                } => {
                    self.buf.advance(header_len);
                    let data = self.buf.split_to(payload_len).freeze();
                    self.buf.advance(2); // trailing CRLF, verified by the scan
                    Value::Bulk(Some(data))
                }
                Unit::ArrayHeader(count) => {
                    self.buf.advance(consumed);
                    self.stack.push(PartialArray {
                        remaining: count,
                        items: Vec::with_capacity(count.min(PREALLOC_CAP)),
                    });
                    continue;
                }
            };

            if let Some(complete) = self.fold(value) {
                return Ok(Some(complete));
            }
        }
    }

    /// Folds a completed value into the innermost partial array, popping
    /// and bubbling each array that fills up. Returns the value when the
    /// stack is empty, i.e. a top-level value is done.
    fn fold(&mut self, mut value: Value) -> Option<Value> {
        loop {
            match self.stack.last_mut() {
                None => return Some(value),
                Some(top) => {
                    top.items.push(value);
                    top.remaining -= 1;
                    if top.remaining > 0 {
                        return None;
                    }
                }
            }
            // innermost array just filled — pop it and keep folding
            let done = self.stack.pop().expect("stack non-empty: just matched via last_mut");
            value = Value::Array(Some(done.items));
        }
    }
}

/// Scans one syntactic unit from the buffer front.
///
/// Never consumes: the caller advances by `scan.pos` only on success.
/// `Incomplete` means the unit isn't fully buffered yet.
fn scan_unit(scan: &mut Scan<'_>, depth: usize) -> Result<Unit, ProtocolError> {
    match scan.byte()? {
        b'+' => {
            let line = scan.line()?;
            let s = std::str::from_utf8(line)
                .map_err(|_| ProtocolError::InvalidUtf8("simple string"))?;
            Ok(Unit::Value(Value::Simple(s.to_owned())))
        }
        b'-' => {
            let line = scan.line()?;
            let s =
                std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8("error"))?;
            Ok(Unit::Value(Value::Error(s.to_owned())))
        }
        b':' => {
            let n = scan.integer()?;
            Ok(Unit::Value(Value::Integer(n)))
        }
        b'$' => {
            let len = scan.integer()?;
            if len == -1 {
                return Ok(Unit::Value(Value::Bulk(None)));
            }
            if len < 0 {
                return Err(ProtocolError::InvalidFrameLength(len));
            }
            if len > MAX_BULK_LEN {
                return Err(ProtocolError::BulkTooLarge(len as usize));
            }
            let len = len as usize;
            let header_len = scan.pos;

            if scan.remaining() < len + 2 {
                return Err(ProtocolError::Incomplete);
            }
            if scan.peek_at(len) != Some(b'\r') || scan.peek_at(len + 1) != Some(b'\n') {
                return Err(ProtocolError::MissingCrlf);
            }

            Ok(Unit::Bulk {
                header_len,
                payload_len: len,
            })
        }
        b'*' => {
            let count = scan.integer()?;
            if count == -1 {
                return Ok(Unit::Value(Value::Array(None)));
            }
            if count < 0 {
                return Err(ProtocolError::InvalidFrameLength(count));
            }
            let count = count as usize;
            if count > MAX_ARRAY_ELEMENTS {
                return Err(ProtocolError::TooManyElements(count));
            }
            if count == 0 {
                return Ok(Unit::Value(Value::Array(Some(Vec::new()))));
            }
            if depth >= MAX_NESTING_DEPTH {
                return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH));
            }
            Ok(Unit::ArrayHeader(count))
        }
        other => Err(ProtocolError::InvalidPrefix(other)),
    }
}

/// Forward-only scanner over the unconsumed buffer.
struct Scan<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scan<'a> {
    fn new(buf: &'a [u8]) -> Scan<'a> {
        Scan { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Byte at `offset` past the current position, if buffered.
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.buf.get(self.pos + offset).copied()
    }

    fn byte(&mut self) -> Result<u8, ProtocolError> {
        let b = *self.buf.get(self.pos).ok_or(ProtocolError::Incomplete)?;
        self.pos += 1;
        Ok(b)
    }

    /// The bytes up to (not including) the next CRLF; advances past it.
    ///
    /// Scans for `\r` with memchr and requires `\n` to follow; a bare
    /// `\r` inside the line is skipped over, matching the RESP framing
    /// rule that only the CRLF pair terminates a line.
    fn line(&mut self) -> Result<&'a [u8], ProtocolError> {
        let start = self.pos;
        let mut from = start;
        while let Some(offset) = memchr::memchr(b'\r', &self.buf[from..]) {
            let cr = from + offset;
            match self.buf.get(cr + 1) {
                Some(b'\n') => {
                    self.pos = cr + 2;
                    return Ok(&self.buf[start..cr]);
                }
                Some(_) => from = cr + 1,
                None => break,
            }
        }
        Err(ProtocolError::Incomplete)
    }

    fn integer(&mut self) -> Result<i64, ProtocolError> {
        let line = self.line()?;
        parse_i64(line)
    }
}

/// Parses an i64 from ASCII decimal without allocating.
///
/// Accumulates negative numbers in the negative direction so i64::MIN
/// round-trips without overflow.
fn parse_i64(digits: &[u8]) -> Result<i64, ProtocolError> {
    let (negative, digits) = match digits.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, digits),
        None => return Err(ProtocolError::InvalidInteger),
    };
    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        let digit = (b - b'0') as i64;
        n = if negative {
            n.checked_mul(10).and_then(|n| n.checked_sub(digit))
        } else {
            n.checked_mul(10).and_then(|n| n.checked_add(digit))
        }
        .ok_or(ProtocolError::InvalidInteger)?;
    }
    Ok(n)
}
