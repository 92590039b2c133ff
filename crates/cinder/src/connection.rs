//! Per-connection actor task.
//!
//! Each connection is driven by one spawned task that owns the socket
//! halves, the decoder, the write buffer, and the reply router. The
//! task selects between two inputs: submissions from client handles and
//! bytes from the transport. Because both paths run on the same task,
//! "append the completion to the queue, then write the bytes" is one
//! uninterruptible step — the ordering RESP2's FIFO matching depends on.
//!
//! # Mode switching
//!
//! The actor starts in request mode. A subscribe submission stages its
//! handler registrations, writes SUBSCRIBE, and flips the connection
//! into subscriber mode as soon as the in-flight queue is empty. The
//! deferral is what keeps the queue transfer legal: the server answers
//! strictly in order, so every outstanding reply lands before the first
//! subscription confirmation, and the queue is empty exactly when the
//! confirmations start. The reverse switch works the same way once the
//! server-reported active count reaches zero.
//!
//! Whitelisted commands submitted while the entry switch is pending are
//! staged on a side queue and joined onto the transferred FIFO, so
//! their replies (which the server sends after the confirmations) still
//! pair correctly.

use bytes::{Bytes, BytesMut};
use cinder_protocol::{encode_command, Decoder, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::metrics;
use crate::pipeline::{Completion, InFlight};
use crate::pubsub::{
    is_whitelisted, MessageHandler, PubSubRouter, SubscribeKind, SubscriptionId,
    SubscriptionTable,
};

/// A submission from a client handle to the connection task.
pub(crate) enum Request {
    Command {
        argv: Vec<Bytes>,
        completion: Completion,
    },
    Subscribe {
        kind: SubscribeKind,
        targets: Vec<String>,
        handler: MessageHandler,
        completion: oneshot::Sender<Result<SubscriptionId, Error>>,
    },
    Unsubscribe {
        kind: SubscribeKind,
        targets: Vec<String>,
        completion: oneshot::Sender<Result<(), Error>>,
    },
    UnsubscribeId {
        id: SubscriptionId,
        completion: oneshot::Sender<Result<(), Error>>,
    },
}

/// The two reply-routing states a connection can be in. The in-flight
/// FIFO is owned by whichever variant is active and moves — never
/// copies — across a switch.
enum Mode {
    Request { in_flight: InFlight },
    PubSub { router: PubSubRouter },
}

/// Spawns the actor for a transport and returns the submission channel.
pub(crate) fn spawn<T>(io: T, config: ClientConfig) -> mpsc::UnboundedSender<Request>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let (reader, writer) = tokio::io::split(io);

    let actor = ConnectionActor {
        reader,
        writer,
        decoder: Decoder::with_capacity(config.read_buffer_capacity),
        out: BytesMut::with_capacity(config.read_buffer_capacity),
        rx,
        mode: Mode::Request {
            in_flight: InFlight::new(),
        },
        staged_subs: SubscriptionTable::default(),
        staged_queue: InFlight::new(),
        entering: false,
    };
    tokio::spawn(actor.run());
    tx
}

struct ConnectionActor<T> {
    reader: ReadHalf<T>,
    writer: WriteHalf<T>,
    decoder: Decoder,
    out: BytesMut,
    rx: mpsc::UnboundedReceiver<Request>,
    mode: Mode,
    /// Handler registrations made while the switch into subscriber mode
    /// is still pending.
    staged_subs: SubscriptionTable,
    /// Whitelisted commands submitted during that same window.
    staged_queue: InFlight,
    /// A subscribe has been written but the mode switch hasn't landed.
    entering: bool,
}

impl<T> ConnectionActor<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn run(mut self) {
        let fatal = loop {
            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(request) => {
                        if let Err(e) = self.on_request(request).await {
                            break e;
                        }
                    }
                    // every client handle dropped; nobody can await a
                    // reply, so close quietly
                    None => {
                        let _ = self.writer.shutdown().await;
                        return;
                    }
                },
                read = self.reader.read_buf(self.decoder.buffer_mut()) => match read {
                    Ok(0) => break Error::ConnectionClosed,
                    Ok(_) => {
                        if let Err(e) = self.drain_decoder() {
                            break e;
                        }
                    }
                    Err(e) => break Error::from(e),
                },
            }
        };
        self.shutdown_with(fatal).await;
    }

    /// Decodes and routes every value the buffer holds.
    fn drain_decoder(&mut self) -> Result<(), Error> {
        loop {
            match self.decoder.decode() {
                Ok(Some(value)) => self.on_value(value)?,
                Ok(None) => return Ok(()),
                Err(e) => return Err(Error::Protocol(e)),
            }
        }
    }

    fn on_value(&mut self, value: Value) -> Result<(), Error> {
        match &mut self.mode {
            Mode::Request { in_flight } => in_flight.resolve(value)?,
            Mode::PubSub { router } => router.dispatch(value)?,
        }
        self.settle_mode()
    }

    /// Lands a pending mode switch once its queue-empty precondition
    /// holds.
    fn settle_mode(&mut self) -> Result<(), Error> {
        match &self.mode {
            Mode::Request { in_flight } if self.entering && in_flight.is_empty() => {
                self.enter_subscriber_mode()
            }
            Mode::PubSub { router } if router.ready_to_exit() => self.exit_subscriber_mode(),
            _ => Ok(()),
        }
    }

    /// Moves the (empty) FIFO into a subscriber-mode router, together
    /// with the staged registrations and staged whitelist commands.
    fn enter_subscriber_mode(&mut self) -> Result<(), Error> {
        let mode = std::mem::replace(
            &mut self.mode,
            Mode::Request {
                in_flight: InFlight::new(),
            },
        );
        let Mode::Request { in_flight } = mode else {
            return Ok(());
        };
        if !in_flight.is_empty() {
            tracing::error!(
                pending = in_flight.len(),
                "subscriber-mode switch attempted with commands in flight"
            );
            return Err(Error::InvalidModeSwitch);
        }

        let mut router = PubSubRouter::new(in_flight, std::mem::take(&mut self.staged_subs));
        router.in_flight.append(&mut self.staged_queue);
        self.mode = Mode::PubSub { router };
        self.entering = false;
        Ok(())
    }

    /// Moves the FIFO back to request mode. Handler registrations die
    /// with the router: the server has already dropped every
    /// subscription, so no further invocations may happen.
    fn exit_subscriber_mode(&mut self) -> Result<(), Error> {
        let mode = std::mem::replace(
            &mut self.mode,
            Mode::Request {
                in_flight: InFlight::new(),
            },
        );
        let Mode::PubSub { router } = mode else {
            return Ok(());
        };
        if !router.in_flight.is_empty() {
            tracing::error!(
                pending = router.in_flight.len(),
                "request-mode switch attempted with commands in flight"
            );
            return Err(Error::InvalidModeSwitch);
        }
        self.mode = Mode::Request {
            in_flight: router.in_flight,
        };
        Ok(())
    }

    async fn on_request(&mut self, request: Request) -> Result<(), Error> {
        match request {
            Request::Command { argv, completion } => self.on_command(argv, completion).await,
            Request::Subscribe {
                kind,
                targets,
                handler,
                completion,
            } => self.on_subscribe(kind, targets, handler, completion).await,
            Request::Unsubscribe {
                kind,
                targets,
                completion,
            } => self.on_unsubscribe(kind, targets, completion).await,
            Request::UnsubscribeId { id, completion } => {
                self.on_unsubscribe_id(id, completion).await
            }
        }
    }

    async fn on_command(&mut self, argv: Vec<Bytes>, completion: Completion) -> Result<(), Error> {
        // Subscriber mode restricts the verb set — but once the last
        // unsubscribe has been written the table is empty, the active
        // count is on its way to zero, and ordinary commands are legal
        // again: their replies arrive after the confirmations and pair
        // through the FIFO as usual.
        let subscribed = match &self.mode {
            Mode::PubSub { router } => !router.subs.is_empty(),
            Mode::Request { .. } => self.entering && !self.staged_subs.is_empty(),
        };
        if subscribed && !is_whitelisted(&argv[0]) {
            let verb = String::from_utf8_lossy(&argv[0]).into_owned();
            metrics::on_command_failed();
            let _ = completion.send(Err(Error::NotPermittedWhileSubscribed(verb)));
            return Ok(());
        }

        // enqueue and write as one step; reordering these would break
        // the FIFO pairing
        let entering = self.entering;
        match &mut self.mode {
            Mode::Request { in_flight } => {
                if entering {
                    self.staged_queue.push(completion);
                } else {
                    in_flight.push(completion);
                }
            }
            Mode::PubSub { router } => router.in_flight.push(completion),
        }
        self.write_command(&argv).await
    }

    async fn on_subscribe(
        &mut self,
        kind: SubscribeKind,
        targets: Vec<String>,
        handler: MessageHandler,
        completion: oneshot::Sender<Result<SubscriptionId, Error>>,
    ) -> Result<(), Error> {
        // register before writing so a confirmation can't observe a
        // half-updated table
        let id = match &mut self.mode {
            Mode::PubSub { router } => {
                router.retain_mode();
                router.subs.register(kind, &targets, handler)
            }
            Mode::Request { .. } => {
                self.entering = true;
                self.staged_subs.register(kind, &targets, handler)
            }
        };

        let verb = match kind {
            SubscribeKind::Channel => "SUBSCRIBE",
            SubscribeKind::Pattern => "PSUBSCRIBE",
        };
        let argv = subscription_argv(verb, &targets);
        self.write_command(&argv).await?;

        // no completion is queued against the server: the confirmation
        // frames are consumed by the push dispatcher, so acknowledge
        // locally with the registration handle
        metrics::on_command_succeeded();
        let _ = completion.send(Ok(id));

        self.settle_mode()
    }

    async fn on_unsubscribe(
        &mut self,
        kind: SubscribeKind,
        targets: Vec<String>,
        completion: oneshot::Sender<Result<(), Error>>,
    ) -> Result<(), Error> {
        let entering = self.entering;
        match &mut self.mode {
            Mode::PubSub { router } => router.subs.remove_named(kind, &targets),
            Mode::Request { .. } if entering => self.staged_subs.remove_named(kind, &targets),
            Mode::Request { .. } => {
                // in request mode the server would answer with a
                // confirmation frame nothing is prepared to consume
                let _ = completion.send(Err(Error::NotSubscribed));
                return Ok(());
            }
        }

        let verb = match kind {
            SubscribeKind::Channel => "UNSUBSCRIBE",
            SubscribeKind::Pattern => "PUNSUBSCRIBE",
        };
        let argv = subscription_argv(verb, &targets);
        self.write_command(&argv).await?;

        metrics::on_command_succeeded();
        let _ = completion.send(Ok(()));
        Ok(())
    }

    async fn on_unsubscribe_id(
        &mut self,
        id: SubscriptionId,
        completion: oneshot::Sender<Result<(), Error>>,
    ) -> Result<(), Error> {
        let entering = self.entering;
        let (channels, patterns) = match &mut self.mode {
            Mode::PubSub { router } => router.subs.remove_id(id),
            Mode::Request { .. } if entering => self.staged_subs.remove_id(id),
            // nothing registered; removing a stale handle is a no-op
            Mode::Request { .. } => (Vec::new(), Vec::new()),
        };

        if !channels.is_empty() {
            let argv = subscription_argv("UNSUBSCRIBE", &channels);
            self.write_command(&argv).await?;
        }
        if !patterns.is_empty() {
            let argv = subscription_argv("PUNSUBSCRIBE", &patterns);
            self.write_command(&argv).await?;
        }

        let _ = completion.send(Ok(()));
        Ok(())
    }

    /// Serializes the argv into the write buffer and flushes it to the
    /// transport.
    async fn write_command(&mut self, argv: &[Bytes]) -> Result<(), Error> {
        self.out.clear();
        encode_command(argv, &mut self.out);
        self.writer.write_all(&self.out).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Fails every pending and queued submission with the same error
    /// and closes the transport.
    async fn shutdown_with(&mut self, error: Error) {
        let in_flight = match &mut self.mode {
            Mode::Request { in_flight } => in_flight,
            Mode::PubSub { router } => &mut router.in_flight,
        };
        let pending = in_flight.len() + self.staged_queue.len();
        if pending == 0 {
            tracing::debug!(error = %error, "connection closed");
        } else {
            tracing::warn!(
                error = %error,
                pending,
                "connection failed, draining pending commands"
            );
        }

        in_flight.drain_with(&error);
        self.staged_queue.drain_with(&error);

        // submissions already sitting on the channel fail the same way
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            fail_request(request, &error);
        }

        let _ = self.writer.shutdown().await;
    }
}

fn subscription_argv(verb: &'static str, targets: &[String]) -> Vec<Bytes> {
    let mut argv = Vec::with_capacity(targets.len() + 1);
    argv.push(Bytes::from_static(verb.as_bytes()));
    for target in targets {
        argv.push(Bytes::copy_from_slice(target.as_bytes()));
    }
    argv
}

fn fail_request(request: Request, error: &Error) {
    match request {
        Request::Command { completion, .. } => {
            metrics::on_command_failed();
            let _ = completion.send(Err(error.clone()));
        }
        Request::Subscribe { completion, .. } => {
            let _ = completion.send(Err(error.clone()));
        }
        Request::Unsubscribe { completion, .. } => {
            let _ = completion.send(Err(error.clone()));
        }
        Request::UnsubscribeId { completion, .. } => {
            let _ = completion.send(Err(error.clone()));
        }
    }
}
