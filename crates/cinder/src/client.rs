//! Typed client surface.
//!
//! [`Client`] is a cheap cloneable handle onto a connection's actor
//! task. Every verb follows the same shape: build the argv through
//! [`CommandArgs`], submit it, decode the reply through [`FromValue`] or
//! [`FromValueOptional`]. Adding a verb is a local change; nothing in
//! the pipeline knows command names.
//!
//! Submission order is send order: the request is handed to the
//! connection task synchronously when a verb is called, and replies
//! complete in that same order.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use cinder_protocol::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};

use crate::command::{CommandArgs, ToArg};
use crate::config::ClientConfig;
use crate::connection::{self, Request};
use crate::convert::{FromValue, FromValueOptional};
use crate::error::Error;
use crate::pubsub::{MessageHandler, SubscribeKind, SubscriptionId};
use crate::streams::{
    ConsumerInfo, GroupInfo, PendingEntry, PendingSummary, StreamEntry, StreamInfo,
    StreamReadReply,
};

/// Options for XCLAIM.
#[derive(Debug, Clone, Default)]
pub struct XClaimOptions {
    /// Set the claimed entries' idle time (IDLE, milliseconds).
    pub idle_ms: Option<u64>,
    /// Set the last-delivery timestamp (TIME, unix milliseconds).
    pub time_ms: Option<u64>,
    /// Set the delivery counter (RETRYCOUNT).
    pub retry_count: Option<u64>,
    /// Claim entries regardless of current ownership (FORCE).
    pub force: bool,
}

/// A handle to one connection.
///
/// Clones share the connection; commands from all clones interleave in
/// submission order. Dropping the last clone closes the connection.
#[derive(Clone)]
pub struct Client {
    tx: mpsc::UnboundedSender<Request>,
}

impl Client {
    /// Connects over TCP with default configuration.
    pub async fn connect(host: &str, port: u16) -> Result<Client, Error> {
        Client::connect_with(host, port, ClientConfig::default()).await
    }

    /// Connects over TCP.
    pub async fn connect_with(
        host: &str,
        port: u16,
        config: ClientConfig,
    ) -> Result<Client, Error> {
        let stream = TcpStream::connect((host, port)).await?;
        if config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }
        Ok(Client::with_transport(stream, config))
    }

    /// Connects over a Unix domain socket.
    #[cfg(unix)]
    pub async fn connect_unix(path: &str) -> Result<Client, Error> {
        let stream = UnixStream::connect(path).await?;
        Ok(Client::with_transport(stream, ClientConfig::default()))
    }

    /// Drives an already-established byte stream. This is the seam for
    /// tests and for transports the crate doesn't know about (TLS
    /// wrappers, in-process pipes).
    pub fn with_transport<T>(io: T, config: ClientConfig) -> Client
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Client {
            tx: connection::spawn(io, config),
        }
    }

    /// Submits a raw command and returns the undecoded reply value.
    ///
    /// The request is handed to the connection when this method is
    /// called, not when the returned future is first polled, so calling
    /// order is wire order.
    pub fn command(&self, args: CommandArgs) -> impl Future<Output = Result<Value, Error>> {
        let (tx, rx) = oneshot::channel();
        let submitted = self
            .tx
            .send(Request::Command {
                argv: args.into_argv(),
                completion: tx,
            })
            .map_err(|_| Error::ConnectionClosed);

        async move {
            submitted?;
            rx.await.map_err(|_| Error::ConnectionClosed)?
        }
    }

    async fn round_trip<T: FromValue>(&self, args: CommandArgs) -> Result<T, Error> {
        let value = self.command(args).await?;
        Ok(T::from_value(value)?)
    }

    async fn round_trip_optional<T: FromValueOptional>(
        &self,
        args: CommandArgs,
    ) -> Result<Option<T>, Error> {
        let value = self.command(args).await?;
        Ok(T::from_value_optional(value)?)
    }

    // -- connection-level verbs --

    /// PING. Resolves to `PONG`.
    pub async fn ping(&self) -> Result<String, Error> {
        self.round_trip(CommandArgs::new("PING")).await
    }

    /// PING with a message; the server echoes it.
    pub async fn ping_message(&self, message: impl ToArg) -> Result<Bytes, Error> {
        self.round_trip(CommandArgs::new("PING").arg(message)).await
    }

    /// ECHO.
    pub async fn echo(&self, message: impl ToArg) -> Result<Bytes, Error> {
        self.round_trip(CommandArgs::new("ECHO").arg(message)).await
    }

    /// QUIT. The server acknowledges and closes the connection.
    pub async fn quit(&self) -> Result<(), Error> {
        self.round_trip::<bool>(CommandArgs::new("QUIT")).await?;
        Ok(())
    }

    // -- basic key/value verbs --

    /// GET, decoded as UTF-8. `None` on a missing key.
    pub async fn get(&self, key: impl ToArg) -> Result<Option<String>, Error> {
        self.round_trip_optional(CommandArgs::new("GET").arg(key))
            .await
    }

    /// GET, raw bytes. `None` on a missing key.
    pub async fn get_bytes(&self, key: impl ToArg) -> Result<Option<Bytes>, Error> {
        self.round_trip_optional(CommandArgs::new("GET").arg(key))
            .await
    }

    /// SET. Resolves to `true` on the server's OK.
    pub async fn set(&self, key: impl ToArg, value: impl ToArg) -> Result<bool, Error> {
        self.round_trip(CommandArgs::new("SET").arg(key).arg(value))
            .await
    }

    /// SET with an EX expiry in seconds.
    pub async fn set_with_expiry(
        &self,
        key: impl ToArg,
        value: impl ToArg,
        seconds: u64,
    ) -> Result<bool, Error> {
        self.round_trip(
            CommandArgs::new("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(seconds),
        )
        .await
    }

    /// DEL. Returns the number of keys removed.
    pub async fn del(&self, keys: &[&str]) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("DEL").args(keys.iter().copied()))
            .await
    }

    /// EXISTS. Returns the number of keys that exist.
    pub async fn exists(&self, keys: &[&str]) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("EXISTS").args(keys.iter().copied()))
            .await
    }

    /// EXPIRE. `true` when the timeout was set.
    pub async fn expire(&self, key: impl ToArg, seconds: u64) -> Result<bool, Error> {
        self.round_trip(CommandArgs::new("EXPIRE").arg(key).arg(seconds))
            .await
    }

    /// TTL in seconds; -1 without expiry, -2 for a missing key.
    pub async fn ttl(&self, key: impl ToArg) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("TTL").arg(key)).await
    }

    /// INCR. Returns the new value.
    pub async fn incr(&self, key: impl ToArg) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("INCR").arg(key)).await
    }

    /// INCRBY.
    pub async fn incr_by(&self, key: impl ToArg, delta: i64) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("INCRBY").arg(key).arg(delta))
            .await
    }

    /// DECR.
    pub async fn decr(&self, key: impl ToArg) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("DECR").arg(key)).await
    }

    // -- streams --

    /// XADD with a server-assigned id. Returns the assigned id.
    pub async fn xadd<K, V>(&self, key: impl ToArg, fields: &[(K, V)]) -> Result<String, Error>
    where
        K: ToArg,
        V: ToArg,
    {
        self.xadd_with_id(key, "*", fields).await
    }

    /// XADD with an explicit id (or `*` for server-assigned).
    pub async fn xadd_with_id<K, V>(
        &self,
        key: impl ToArg,
        id: impl ToArg,
        fields: &[(K, V)],
    ) -> Result<String, Error>
    where
        K: ToArg,
        V: ToArg,
    {
        let mut args = CommandArgs::new("XADD").arg(key).arg(id);
        for (field, value) in fields {
            args = args.arg(field).arg(value);
        }
        self.round_trip(args).await
    }

    /// XLEN.
    pub async fn xlen(&self, key: impl ToArg) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("XLEN").arg(key)).await
    }

    /// XRANGE between two ids (`-` and `+` for the full range).
    pub async fn xrange(
        &self,
        key: impl ToArg,
        start: impl ToArg,
        end: impl ToArg,
        count: Option<u64>,
    ) -> Result<Vec<StreamEntry>, Error> {
        self.round_trip(
            CommandArgs::new("XRANGE")
                .arg(key)
                .arg(start)
                .arg(end)
                .opt("COUNT", count),
        )
        .await
    }

    /// XREVRANGE between two ids, newest first.
    pub async fn xrevrange(
        &self,
        key: impl ToArg,
        end: impl ToArg,
        start: impl ToArg,
        count: Option<u64>,
    ) -> Result<Vec<StreamEntry>, Error> {
        self.round_trip(
            CommandArgs::new("XREVRANGE")
                .arg(key)
                .arg(end)
                .arg(start)
                .opt("COUNT", count),
        )
        .await
    }

    /// XDEL. Returns the number of entries removed.
    pub async fn xdel(&self, key: impl ToArg, ids: &[&str]) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("XDEL").arg(key).args(ids.iter().copied()))
            .await
    }

    /// XTRIM to a maximum length. `approximate` uses the `~` form.
    pub async fn xtrim(
        &self,
        key: impl ToArg,
        max_len: u64,
        approximate: bool,
    ) -> Result<i64, Error> {
        self.round_trip(
            CommandArgs::new("XTRIM")
                .arg(key)
                .arg("MAXLEN")
                .flag("~", approximate)
                .arg(max_len),
        )
        .await
    }

    /// XREAD from one or more streams.
    ///
    /// Streams are explicit `(key, id)` pairs: the STREAMS argument
    /// interleaves all keys then all ids, and pairing them positionally
    /// from a caller-supplied map would silently depend on iteration
    /// order.
    ///
    /// `block_ms` issues a blocking read; the connection's FIFO stays
    /// correct, but every later command on this connection waits behind
    /// it until the server answers.
    pub async fn xread(
        &self,
        streams: &[(&str, &str)],
        count: Option<u64>,
        block_ms: Option<u64>,
    ) -> Result<StreamReadReply, Error> {
        let mut args = CommandArgs::new("XREAD")
            .opt("COUNT", count)
            .opt("BLOCK", block_ms)
            .arg("STREAMS");
        args = args.args(streams.iter().map(|(key, _)| *key));
        args = args.args(streams.iter().map(|(_, id)| *id));
        self.round_trip(args).await
    }

    /// XREADGROUP on behalf of a consumer group member.
    #[allow(clippy::too_many_arguments)]
    pub async fn xread_group(
        &self,
        group: impl ToArg,
        consumer: impl ToArg,
        streams: &[(&str, &str)],
        count: Option<u64>,
        block_ms: Option<u64>,
        no_ack: bool,
    ) -> Result<StreamReadReply, Error> {
        let mut args = CommandArgs::new("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .opt("COUNT", count)
            .opt("BLOCK", block_ms)
            .flag("NOACK", no_ack)
            .arg("STREAMS");
        args = args.args(streams.iter().map(|(key, _)| *key));
        args = args.args(streams.iter().map(|(_, id)| *id));
        self.round_trip(args).await
    }

    /// XACK. Returns the number of entries acknowledged.
    pub async fn xack(
        &self,
        key: impl ToArg,
        group: impl ToArg,
        ids: &[&str],
    ) -> Result<i64, Error> {
        self.round_trip(
            CommandArgs::new("XACK")
                .arg(key)
                .arg(group)
                .args(ids.iter().copied()),
        )
        .await
    }

    /// XGROUP CREATE. `mkstream` creates the stream when missing.
    pub async fn xgroup_create(
        &self,
        key: impl ToArg,
        group: impl ToArg,
        id: impl ToArg,
        mkstream: bool,
    ) -> Result<bool, Error> {
        self.round_trip(
            CommandArgs::new("XGROUP")
                .arg("CREATE")
                .arg(key)
                .arg(group)
                .arg(id)
                .flag("MKSTREAM", mkstream),
        )
        .await
    }

    /// XGROUP DESTROY. Returns the number of groups destroyed.
    pub async fn xgroup_destroy(&self, key: impl ToArg, group: impl ToArg) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("XGROUP").arg("DESTROY").arg(key).arg(group))
            .await
    }

    /// XINFO STREAM.
    pub async fn xinfo_stream(&self, key: impl ToArg) -> Result<StreamInfo, Error> {
        self.round_trip(CommandArgs::new("XINFO").arg("STREAM").arg(key))
            .await
    }

    /// XINFO GROUPS.
    pub async fn xinfo_groups(&self, key: impl ToArg) -> Result<Vec<GroupInfo>, Error> {
        self.round_trip(CommandArgs::new("XINFO").arg("GROUPS").arg(key))
            .await
    }

    /// XINFO CONSUMERS.
    pub async fn xinfo_consumers(
        &self,
        key: impl ToArg,
        group: impl ToArg,
    ) -> Result<Vec<ConsumerInfo>, Error> {
        self.round_trip(CommandArgs::new("XINFO").arg("CONSUMERS").arg(key).arg(group))
            .await
    }

    /// XPENDING summary form. `None` when nothing is pending.
    pub async fn xpending(
        &self,
        key: impl ToArg,
        group: impl ToArg,
    ) -> Result<Option<PendingSummary>, Error> {
        self.round_trip_optional(CommandArgs::new("XPENDING").arg(key).arg(group))
            .await
    }

    /// XPENDING extended form: per-entry detail over an id range,
    /// optionally filtered to one consumer.
    pub async fn xpending_extended(
        &self,
        key: impl ToArg,
        group: impl ToArg,
        start: impl ToArg,
        end: impl ToArg,
        count: u64,
        consumer: Option<&str>,
    ) -> Result<Vec<PendingEntry>, Error> {
        let mut args = CommandArgs::new("XPENDING")
            .arg(key)
            .arg(group)
            .arg(start)
            .arg(end)
            .arg(count);
        if let Some(consumer) = consumer {
            args = args.arg(consumer);
        }
        self.round_trip(args).await
    }

    /// XCLAIM: transfer ownership of pending entries to this consumer.
    /// Returns the claimed entries.
    #[allow(clippy::too_many_arguments)]
    pub async fn xclaim(
        &self,
        key: impl ToArg,
        group: impl ToArg,
        consumer: impl ToArg,
        min_idle_ms: u64,
        ids: &[&str],
        options: &XClaimOptions,
    ) -> Result<Vec<StreamEntry>, Error> {
        self.round_trip(self.xclaim_args(key, group, consumer, min_idle_ms, ids, options))
            .await
    }

    /// XCLAIM JUSTID: claim without fetching the entries; returns ids
    /// only and leaves delivery counters untouched.
    #[allow(clippy::too_many_arguments)]
    pub async fn xclaim_just_ids(
        &self,
        key: impl ToArg,
        group: impl ToArg,
        consumer: impl ToArg,
        min_idle_ms: u64,
        ids: &[&str],
        options: &XClaimOptions,
    ) -> Result<Vec<String>, Error> {
        let args = self
            .xclaim_args(key, group, consumer, min_idle_ms, ids, options)
            .arg("JUSTID");
        self.round_trip(args).await
    }

    fn xclaim_args(
        &self,
        key: impl ToArg,
        group: impl ToArg,
        consumer: impl ToArg,
        min_idle_ms: u64,
        ids: &[&str],
        options: &XClaimOptions,
    ) -> CommandArgs {
        CommandArgs::new("XCLAIM")
            .arg(key)
            .arg(group)
            .arg(consumer)
            .arg(min_idle_ms)
            .args(ids.iter().copied())
            .opt("IDLE", options.idle_ms)
            .opt("TIME", options.time_ms)
            .opt("RETRYCOUNT", options.retry_count)
            .flag("FORCE", options.force)
    }

    // -- pub/sub --

    /// PUBLISH. Returns the number of subscribers that received the
    /// message.
    pub async fn publish(&self, channel: impl ToArg, payload: impl ToArg) -> Result<i64, Error> {
        self.round_trip(CommandArgs::new("PUBLISH").arg(channel).arg(payload))
            .await
    }

    /// SUBSCRIBE: registers the handler under each channel and switches
    /// the connection into subscriber mode. The handler runs on the
    /// connection's task for every message delivered to one of the
    /// channels, in registration order relative to other handlers.
    pub async fn subscribe<F>(
        &self,
        channels: &[&str],
        handler: F,
    ) -> Result<SubscriptionId, Error>
    where
        F: Fn(&str, &Bytes) + Send + Sync + 'static,
    {
        self.subscribe_inner(SubscribeKind::Channel, channels, Arc::new(handler))
            .await
    }

    /// PSUBSCRIBE: like [`Client::subscribe`] but for glob patterns.
    /// The handler receives the concrete channel, not the pattern.
    pub async fn psubscribe<F>(
        &self,
        patterns: &[&str],
        handler: F,
    ) -> Result<SubscriptionId, Error>
    where
        F: Fn(&str, &Bytes) + Send + Sync + 'static,
    {
        self.subscribe_inner(SubscribeKind::Pattern, patterns, Arc::new(handler))
            .await
    }

    async fn subscribe_inner(
        &self,
        kind: SubscribeKind,
        targets: &[&str],
        handler: MessageHandler,
    ) -> Result<SubscriptionId, Error> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Request::Subscribe {
                kind,
                targets: targets.iter().map(|s| (*s).to_owned()).collect(),
                handler,
                completion: tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// UNSUBSCRIBE: drops every handler for the named channels. When
    /// the last subscription goes, the connection leaves subscriber
    /// mode.
    pub async fn unsubscribe(&self, channels: &[&str]) -> Result<(), Error> {
        self.unsubscribe_inner(SubscribeKind::Channel, channels).await
    }

    /// PUNSUBSCRIBE: drops every handler for the named patterns.
    pub async fn punsubscribe(&self, patterns: &[&str]) -> Result<(), Error> {
        self.unsubscribe_inner(SubscribeKind::Pattern, patterns).await
    }

    async fn unsubscribe_inner(&self, kind: SubscribeKind, targets: &[&str]) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Request::Unsubscribe {
                kind,
                targets: targets.iter().map(|s| (*s).to_owned()).collect(),
                completion: tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Removes one registration by its handle. Channels left without
    /// any handler are unsubscribed on the wire.
    pub async fn unsubscribe_id(&self, id: SubscriptionId) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Request::UnsubscribeId { id, completion: tx })
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }
}
