//! Subscriber-mode dispatch.
//!
//! Once a connection issues SUBSCRIBE or PSUBSCRIBE, most inbound frames
//! are unsolicited pushes: `[message, channel, payload]`,
//! `[pmessage, pattern, channel, payload]`, and subscription-change
//! confirmations carrying the server's active-subscription count. The
//! [`PubSubRouter`] classifies each frame, runs registered handlers for
//! messages, tracks the active count, and forwards anything that isn't a
//! push to the whitelist FIFO it inherited from request mode.
//!
//! Handlers run on the connection's task in registration order; long
//! work belongs on the caller's side of a channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use cinder_protocol::Value;

use crate::error::Error;
use crate::pipeline::InFlight;

/// Opaque token for one handler registration, returned by subscribe and
/// usable for selective unsubscribe. Ids are process-unique so a stale
/// handle can never remove somebody else's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> SubscriptionId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SubscriptionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Callback invoked with `(channel, payload)` for each delivered message.
pub type MessageHandler = Arc<dyn Fn(&str, &Bytes) + Send + Sync>;

/// Whether a subscription targets exact channels or glob patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscribeKind {
    Channel,
    Pattern,
}

/// Commands still answered request/response while subscribed.
pub(crate) fn is_whitelisted(verb: &[u8]) -> bool {
    verb.eq_ignore_ascii_case(b"PING") || verb.eq_ignore_ascii_case(b"QUIT")
}

/// Registered handlers, keyed by channel name or pattern.
///
/// Owned by the connection's task; per-key registration order is the
/// invocation order.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    channels: HashMap<String, Vec<(SubscriptionId, MessageHandler)>>,
    patterns: HashMap<String, Vec<(SubscriptionId, MessageHandler)>>,
}

impl SubscriptionTable {
    fn map_for(
        &mut self,
        kind: SubscribeKind,
    ) -> &mut HashMap<String, Vec<(SubscriptionId, MessageHandler)>> {
        match kind {
            SubscribeKind::Channel => &mut self.channels,
            SubscribeKind::Pattern => &mut self.patterns,
        }
    }

    /// Registers one handler under every listed target, returning the
    /// handle that identifies this registration.
    pub fn register(
        &mut self,
        kind: SubscribeKind,
        targets: &[String],
        handler: MessageHandler,
    ) -> SubscriptionId {
        let id = SubscriptionId::next();
        let map = self.map_for(kind);
        for target in targets {
            map.entry(target.clone())
                .or_default()
                .push((id, Arc::clone(&handler)));
        }
        id
    }

    /// Removes every handler for the named targets. After this no
    /// further invocations can happen for them.
    pub fn remove_named(&mut self, kind: SubscribeKind, targets: &[String]) {
        let map = self.map_for(kind);
        for target in targets {
            map.remove(target);
        }
    }

    /// Removes one registration by handle. Returns the channel and
    /// pattern names left without any handler, which the caller should
    /// unsubscribe on the wire.
    pub fn remove_id(&mut self, id: SubscriptionId) -> (Vec<String>, Vec<String>) {
        let mut emptied_channels = Vec::new();
        let mut emptied_patterns = Vec::new();

        for (names, map) in [
            (&mut emptied_channels, &mut self.channels),
            (&mut emptied_patterns, &mut self.patterns),
        ] {
            map.retain(|name, handlers| {
                handlers.retain(|(hid, _)| *hid != id);
                if handlers.is_empty() {
                    names.push(name.clone());
                    false
                } else {
                    true
                }
            });
        }

        (emptied_channels, emptied_patterns)
    }

    /// Runs every handler registered under the channel, in registration
    /// order. Returns how many ran.
    pub fn dispatch_message(&self, channel: &str, payload: &Bytes) -> usize {
        match self.channels.get(channel) {
            Some(handlers) => {
                for (_, handler) in handlers {
                    handler(channel, payload);
                }
                handlers.len()
            }
            None => 0,
        }
    }

    /// Runs every handler registered under the pattern. The handler
    /// still receives the concrete channel the message arrived on.
    pub fn dispatch_pmessage(&self, pattern: &str, channel: &str, payload: &Bytes) -> usize {
        match self.patterns.get(pattern) {
            Some(handlers) => {
                for (_, handler) in handlers {
                    handler(channel, payload);
                }
                handlers.len()
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.patterns.is_empty()
    }
}

/// An inbound frame recognised as a Pub/Sub push.
#[derive(Debug)]
enum PushFrame {
    Message {
        channel: String,
        payload: Bytes,
    },
    PMessage {
        pattern: String,
        channel: String,
        payload: Bytes,
    },
    SubscriptionChange {
        kind: &'static str,
        active: usize,
    },
}

impl PushFrame {
    /// Attempts to read `value` as a push frame. `None` means the frame
    /// doesn't match the push shape and belongs to the whitelist FIFO.
    fn parse(value: &Value) -> Option<PushFrame> {
        let items = match value {
            Value::Array(Some(items)) => items,
            _ => return None,
        };

        let kind = as_text(items.first()?)?;
        match (kind, items.len()) {
            ("message", 3) => Some(PushFrame::Message {
                channel: as_text(&items[1])?.to_owned(),
                payload: as_payload(&items[2])?,
            }),
            ("pmessage", 4) => Some(PushFrame::PMessage {
                pattern: as_text(&items[1])?.to_owned(),
                channel: as_text(&items[2])?.to_owned(),
                payload: as_payload(&items[3])?,
            }),
            ("subscribe", 3) => change("subscribe", &items[2]),
            ("psubscribe", 3) => change("psubscribe", &items[2]),
            ("unsubscribe", 3) => change("unsubscribe", &items[2]),
            ("punsubscribe", 3) => change("punsubscribe", &items[2]),
            _ => None,
        }
    }
}

fn change(kind: &'static str, count: &Value) -> Option<PushFrame> {
    match count {
        Value::Integer(n) if *n >= 0 => Some(PushFrame::SubscriptionChange {
            kind,
            active: *n as usize,
        }),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<&str> {
    match value {
        Value::Simple(s) => Some(s),
        Value::Bulk(Some(data)) => std::str::from_utf8(data).ok(),
        _ => None,
    }
}

fn as_payload(value: &Value) -> Option<Bytes> {
    match value {
        Value::Bulk(Some(data)) => Some(data.clone()),
        _ => None,
    }
}

/// The subscriber-mode variant of the reply router.
///
/// Shares the request pipeline's FIFO (moved in at mode entry) for the
/// whitelisted commands that still behave request/response.
pub(crate) struct PubSubRouter {
    pub in_flight: InFlight,
    pub subs: SubscriptionTable,
    exit_requested: bool,
}

impl PubSubRouter {
    pub fn new(in_flight: InFlight, subs: SubscriptionTable) -> PubSubRouter {
        PubSubRouter {
            in_flight,
            subs,
            exit_requested: false,
        }
    }

    /// Routes one inbound value. An `Err` is fatal to the connection.
    pub fn dispatch(&mut self, value: Value) -> Result<(), Error> {
        match PushFrame::parse(&value) {
            Some(PushFrame::Message { channel, payload }) => {
                let ran = self.subs.dispatch_message(&channel, &payload);
                if ran == 0 {
                    tracing::debug!(channel = %channel, "message for channel with no handlers");
                }
                Ok(())
            }
            Some(PushFrame::PMessage {
                pattern,
                channel,
                payload,
            }) => {
                let ran = self.subs.dispatch_pmessage(&pattern, &channel, &payload);
                if ran == 0 {
                    tracing::debug!(pattern = %pattern, "pmessage for pattern with no handlers");
                }
                Ok(())
            }
            Some(PushFrame::SubscriptionChange { kind, active }) => {
                tracing::debug!(kind, active, "subscription change");
                if active == 0 {
                    // server-side subscriptions are gone; leave
                    // subscriber mode once the whitelist queue drains
                    self.exit_requested = true;
                }
                Ok(())
            }
            None => {
                tracing::debug!(
                    kind = value.kind(),
                    "non-pubsub frame while subscribed, forwarding to reply queue"
                );
                self.in_flight.resolve(value)
            }
        }
    }

    /// True once the active count has hit zero and nothing is left in
    /// the whitelist queue, i.e. it is safe to move the queue back to
    /// request mode.
    pub fn ready_to_exit(&self) -> bool {
        self.exit_requested && self.in_flight.is_empty()
    }

    /// Cancels a pending exit; called when a new subscription is made
    /// before the mode switch lands.
    pub fn retain_mode(&mut self) {
        self.exit_requested = false;
    }
}
