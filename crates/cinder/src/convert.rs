//! Typed decoding of RESP2 values.
//!
//! Two capabilities, kept deliberately distinct:
//!
//! - [`FromValue`] is total: it produces the target type or fails.
//! - [`FromValueOptional`] models absence: every null spelling decodes
//!   to `Ok(None)`, which is not a decode failure.
//!
//! Conflating the two would make a GET miss indistinguishable from a
//! malformed reply, so the facade picks the capability per verb.

use std::collections::HashMap;

use bytes::Bytes;
use cinder_protocol::Value;

use crate::error::DecodeError;

/// Converts a [`Value`] into a domain type, or fails with the reason.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, DecodeError>;
}

/// Converts a [`Value`] into a domain type, mapping the server-side
/// notion of "no value" to `Ok(None)`.
pub trait FromValueOptional: Sized {
    fn from_value_optional(value: Value) -> Result<Option<Self>, DecodeError>;
}

/// Derives the optional capability from the total one: null means
/// absent, anything else must decode. Types whose optional form means
/// more than "null is None" (XPENDING summaries) implement
/// [`FromValueOptional`] by hand instead.
macro_rules! optional_via_total {
    ($($target:ty),+ $(,)?) => {$(
        impl FromValueOptional for $target {
            fn from_value_optional(
                value: Value,
            ) -> Result<Option<$target>, DecodeError> {
                if value.is_null() {
                    return Ok(None);
                }
                <$target as FromValue>::from_value(value).map(Some)
            }
        }
    )+};
}
pub(crate) use optional_via_total;

optional_via_total!(Value, i64, String, Bytes, bool, f64);

impl<T: FromValue> FromValueOptional for Vec<T> {
    fn from_value_optional(value: Value) -> Result<Option<Vec<T>>, DecodeError> {
        if value.is_null() {
            return Ok(None);
        }
        Vec::from_value(value).map(Some)
    }
}

impl<T: FromValue> FromValueOptional for HashMap<String, T> {
    fn from_value_optional(value: Value) -> Result<Option<HashMap<String, T>>, DecodeError> {
        if value.is_null() {
            return Ok(None);
        }
        HashMap::from_value(value).map(Some)
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Value, DecodeError> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<i64, DecodeError> {
        let got = value.kind();
        match value {
            Value::Integer(n) => Ok(n),
            Value::Simple(s) => parse_int(s.as_bytes(), got),
            Value::Bulk(Some(data)) => parse_int(&data, got),
            _ => Err(mismatch("integer", got)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<String, DecodeError> {
        let got = value.kind();
        match value {
            Value::Simple(s) => Ok(s),
            Value::Bulk(Some(data)) => {
                String::from_utf8(data.to_vec()).map_err(|_| mismatch("utf-8 string", got))
            }
            _ => Err(mismatch("string", got)),
        }
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> Result<Bytes, DecodeError> {
        match value {
            Value::Bulk(Some(data)) => Ok(data),
            other => Err(mismatch("bulk string", other.kind())),
        }
    }
}

/// Acknowledgement-style decoding: integer 1/0, or the `+OK` reply.
impl FromValue for bool {
    fn from_value(value: Value) -> Result<bool, DecodeError> {
        match value {
            Value::Integer(1) => Ok(true),
            Value::Integer(0) => Ok(false),
            Value::Simple(ref s) if s == "OK" => Ok(true),
            other => Err(mismatch("boolean", other.kind())),
        }
    }
}

/// Redis transmits floats as string-encoded decimals.
impl FromValue for f64 {
    fn from_value(value: Value) -> Result<f64, DecodeError> {
        let got = value.kind();
        let text = match value {
            Value::Simple(s) => s,
            Value::Bulk(Some(data)) => {
                String::from_utf8(data.to_vec()).map_err(|_| mismatch("float", got))?
            }
            _ => return Err(mismatch("float", got)),
        };
        text.parse::<f64>().map_err(|_| mismatch("float", got))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Vec<T>, DecodeError> {
        let got = value.kind();
        let items = match value {
            Value::Array(Some(items)) => items,
            _ => return Err(mismatch("array", got)),
        };
        items
            .into_iter()
            .map(|item| T::from_value(item).map_err(|cause| composite("array", got, cause)))
            .collect()
    }
}

/// An even-length array interpreted as alternating key/value pairs.
impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> Result<HashMap<String, T>, DecodeError> {
        let got = value.kind();
        let items = match value {
            Value::Array(Some(items)) => items,
            _ => return Err(mismatch("key/value array", got)),
        };
        if items.len() % 2 != 0 {
            return Err(mismatch("key/value array", got));
        }

        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            let key = String::from_value(k)
                .map_err(|cause| composite("key/value array", got, cause))?;
            let val =
                T::from_value(v).map_err(|cause| composite("key/value array", got, cause))?;
            map.insert(key, val);
        }
        Ok(map)
    }
}

/// Reads the `(key, value)` pair at a fixed offset of a labelled reply
/// (`[k1, v1, k2, v2, …]`) and enforces the expected key.
///
/// Several stream introspection commands (XINFO STREAM and friends)
/// reply in this form with documented key positions; decoding by offset
/// with a key check catches server/client version skew instead of
/// silently mispairing fields.
pub fn labelled_field<T: FromValue>(
    items: &[Value],
    offset: usize,
    expected: &str,
) -> Result<T, DecodeError> {
    let key_value = items
        .get(offset)
        .ok_or(DecodeError::IndexOutOfRange { index: offset })?;
    let actual = String::from_value(key_value.clone())?;
    if actual != expected {
        return Err(DecodeError::KeyMismatch {
            expected: expected.to_owned(),
            actual,
        });
    }
    let value = items
        .get(offset + 1)
        .ok_or(DecodeError::IndexOutOfRange { index: offset + 1 })?;
    T::from_value(value.clone())
}

fn parse_int(digits: &[u8], got: &'static str) -> Result<i64, DecodeError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| mismatch("integer", got))
}

pub(crate) fn mismatch(expected: &'static str, got: &'static str) -> DecodeError {
    DecodeError::TypeMismatch { expected, got }
}

pub(crate) fn composite(
    expected: &'static str,
    got: &'static str,
    cause: DecodeError,
) -> DecodeError {
    DecodeError::Composite {
        expected,
        got,
        cause: Box::new(cause),
    }
}
