//! Typed views of Stream command replies.
//!
//! XREAD, XINFO, XPENDING and friends reply with deeply nested arrays
//! whose element positions are fixed by the protocol. The decoders here
//! pin those positions (with key checks where the reply is labelled) so
//! callers get structured data or a precise [`DecodeError`] instead of
//! fishing through raw values.

use bytes::Bytes;
use cinder_protocol::Value;

use crate::convert::{
    composite, labelled_field, mismatch, optional_via_total, FromValue, FromValueOptional,
};
use crate::error::DecodeError;

/// One entry of a stream: its server-assigned id plus the field/value
/// pairs stored with it.
///
/// Field order is preserved as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(String, Bytes)>,
}

impl StreamEntry {
    /// The value of the named field, if present.
    pub fn field(&self, name: &str) -> Option<&Bytes> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

/// Wire shape: `[id, [k1, v1, k2, v2, …]]`.
impl FromValue for StreamEntry {
    fn from_value(value: Value) -> Result<StreamEntry, DecodeError> {
        let got = value.kind();
        let items = as_array(value, "stream entry")?;
        if items.len() < 2 {
            return Err(DecodeError::IndexOutOfRange { index: 1 });
        }
        let mut items = items.into_iter();
        let id = String::from_value(next(&mut items)?)
            .map_err(|cause| composite("stream entry", got, cause))?;

        let hash = next(&mut items)?;
        let hash_kind = hash.kind();
        let pairs = as_array(hash, "stream entry fields")?;
        if pairs.len() % 2 != 0 {
            return Err(mismatch("stream entry fields", hash_kind));
        }

        let mut fields = Vec::with_capacity(pairs.len() / 2);
        let mut pairs = pairs.into_iter();
        while let (Some(k), Some(v)) = (pairs.next(), pairs.next()) {
            let key = String::from_value(k)
                .map_err(|cause| composite("stream entry fields", hash_kind, cause))?;
            let val = Bytes::from_value(v)
                .map_err(|cause| composite("stream entry fields", hash_kind, cause))?;
            fields.push((key, val));
        }

        Ok(StreamEntry { id, fields })
    }
}

/// Reply to XREAD / XREADGROUP: entries grouped per stream key, in the
/// order the server listed the streams.
///
/// A null reply (no data before the deadline) decodes to an empty
/// `streams` list rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamReadReply {
    pub streams: Vec<(String, Vec<StreamEntry>)>,
}

impl StreamReadReply {
    /// Entries for the given stream key, if the reply mentions it.
    pub fn entries(&self, key: &str) -> Option<&[StreamEntry]> {
        self.streams
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Wire shape: `[[streamKey, [entry, …]], …]` or a null array.
impl FromValue for StreamReadReply {
    fn from_value(value: Value) -> Result<StreamReadReply, DecodeError> {
        if value.is_null() {
            return Ok(StreamReadReply::default());
        }
        let got = value.kind();
        let items = as_array(value, "stream read reply")?;

        let mut streams = Vec::with_capacity(items.len());
        for item in items {
            let pair = as_array(item, "stream read reply")?;
            if pair.len() < 2 {
                return Err(DecodeError::IndexOutOfRange { index: 1 });
            }
            let mut pair = pair.into_iter();
            let key = String::from_value(next(&mut pair)?)
                .map_err(|cause| composite("stream read reply", got, cause))?;
            let entries = Vec::<StreamEntry>::from_value(next(&mut pair)?)
                .map_err(|cause| composite("stream read reply", got, cause))?;
            streams.push((key, entries));
        }
        Ok(StreamReadReply { streams })
    }
}

/// Reply to XINFO STREAM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub length: i64,
    pub radix_tree_keys: i64,
    pub radix_tree_nodes: i64,
    pub groups: i64,
    pub last_generated_id: String,
    pub first_entry: Option<StreamEntry>,
    pub last_entry: Option<StreamEntry>,
}

/// Labelled pairs at fixed offsets 0,2,4,6,8,10,12.
impl FromValue for StreamInfo {
    fn from_value(value: Value) -> Result<StreamInfo, DecodeError> {
        let items = as_array(value, "stream info")?;
        Ok(StreamInfo {
            length: labelled_field(&items, 0, "length")?,
            radix_tree_keys: labelled_field(&items, 2, "radix-tree-keys")?,
            radix_tree_nodes: labelled_field(&items, 4, "radix-tree-nodes")?,
            groups: labelled_field(&items, 6, "groups")?,
            last_generated_id: labelled_field(&items, 8, "last-generated-id")?,
            first_entry: labelled_field::<Value>(&items, 10, "first-entry")
                .and_then(StreamEntry::from_value_optional)?,
            last_entry: labelled_field::<Value>(&items, 12, "last-entry")
                .and_then(StreamEntry::from_value_optional)?,
        })
    }
}

/// One element of the XINFO GROUPS reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub name: String,
    pub consumers: i64,
    pub pending: i64,
    pub last_delivered_id: String,
}

/// Labelled pairs at offsets 0,2,4,6.
impl FromValue for GroupInfo {
    fn from_value(value: Value) -> Result<GroupInfo, DecodeError> {
        let items = as_array(value, "group info")?;
        Ok(GroupInfo {
            name: labelled_field(&items, 0, "name")?,
            consumers: labelled_field(&items, 2, "consumers")?,
            pending: labelled_field(&items, 4, "pending")?,
            last_delivered_id: labelled_field(&items, 6, "last-delivered-id")?,
        })
    }
}

/// One element of the XINFO CONSUMERS reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerInfo {
    pub name: String,
    pub pending: i64,
    /// Idle time in milliseconds.
    pub idle: i64,
}

/// Labelled pairs at offsets 0,2,4.
impl FromValue for ConsumerInfo {
    fn from_value(value: Value) -> Result<ConsumerInfo, DecodeError> {
        let items = as_array(value, "consumer info")?;
        Ok(ConsumerInfo {
            name: labelled_field(&items, 0, "name")?,
            pending: labelled_field(&items, 2, "pending")?,
            idle: labelled_field(&items, 4, "idle")?,
        })
    }
}

/// Summary form of XPENDING: totals plus the per-consumer breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSummary {
    pub count: i64,
    pub smallest_id: String,
    pub greatest_id: String,
    /// `(consumer name, pending count)` pairs.
    pub consumers: Vec<(String, i64)>,
}

/// Wire shape: `[count, smallestId, greatestId, [[consumer, count], …]]`.
///
/// Deliberately not a total [`FromValue`]: a zero count means "nothing
/// pending" and comes with null id fields, so the only faithful decoding
/// is the optional one.
impl FromValueOptional for PendingSummary {
    fn from_value_optional(value: Value) -> Result<Option<PendingSummary>, DecodeError> {
        if value.is_null() {
            return Ok(None);
        }
        let got = value.kind();
        let items = as_array(value, "pending summary")?;
        if items.len() < 4 {
            return Err(DecodeError::IndexOutOfRange {
                index: items.len(),
            });
        }
        let mut items = items.into_iter();

        let count = i64::from_value(next(&mut items)?)
            .map_err(|cause| composite("pending summary", got, cause))?;
        if count == 0 {
            return Ok(None);
        }

        let smallest_id = String::from_value(next(&mut items)?)
            .map_err(|cause| composite("pending summary", got, cause))?;
        let greatest_id = String::from_value(next(&mut items)?)
            .map_err(|cause| composite("pending summary", got, cause))?;

        let consumer_items = as_array(next(&mut items)?, "pending summary consumers")?;
        let mut consumers = Vec::with_capacity(consumer_items.len());
        for item in consumer_items {
            let pair = as_array(item, "pending summary consumers")?;
            if pair.len() < 2 {
                return Err(DecodeError::IndexOutOfRange { index: 1 });
            }
            let mut pair = pair.into_iter();
            let name = String::from_value(next(&mut pair)?)
                .map_err(|cause| composite("pending summary consumers", got, cause))?;
            let pending = i64::from_value(next(&mut pair)?)
                .map_err(|cause| composite("pending summary consumers", got, cause))?;
            consumers.push((name, pending));
        }

        Ok(Some(PendingSummary {
            count,
            smallest_id,
            greatest_id,
            consumers,
        }))
    }
}

/// One row of the extended XPENDING reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: String,
    pub consumer: String,
    /// Milliseconds since the entry was last delivered.
    pub ms_since_delivered: i64,
    pub delivery_count: i64,
}

/// Wire shape: `[id, consumer, msSinceLast, deliveryCount]`.
impl FromValue for PendingEntry {
    fn from_value(value: Value) -> Result<PendingEntry, DecodeError> {
        let got = value.kind();
        let items = as_array(value, "pending entry")?;
        if items.len() < 4 {
            return Err(DecodeError::IndexOutOfRange {
                index: items.len(),
            });
        }
        let mut items = items.into_iter();
        Ok(PendingEntry {
            id: String::from_value(next(&mut items)?)
                .map_err(|cause| composite("pending entry", got, cause))?,
            consumer: String::from_value(next(&mut items)?)
                .map_err(|cause| composite("pending entry", got, cause))?,
            ms_since_delivered: i64::from_value(next(&mut items)?)
                .map_err(|cause| composite("pending entry", got, cause))?,
            delivery_count: i64::from_value(next(&mut items)?)
                .map_err(|cause| composite("pending entry", got, cause))?,
        })
    }
}

optional_via_total!(
    StreamEntry,
    StreamReadReply,
    StreamInfo,
    GroupInfo,
    ConsumerInfo,
    PendingEntry,
);

fn as_array(value: Value, expected: &'static str) -> Result<Vec<Value>, DecodeError> {
    let got = value.kind();
    match value {
        Value::Array(Some(items)) => Ok(items),
        _ => Err(mismatch(expected, got)),
    }
}

fn next(iter: &mut impl Iterator<Item = Value>) -> Result<Value, DecodeError> {
    iter.next().ok_or(DecodeError::IndexOutOfRange { index: 0 })
}
