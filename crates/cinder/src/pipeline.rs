//! FIFO pairing of commands with replies.
//!
//! RESP2 has no request tags: the server answers strictly in the order
//! requests arrived, so matching a reply to its command is a queue pop.
//! [`InFlight`] owns that queue. Completions are enqueued in the same
//! atomic step that hands the encoded bytes to the transport — any
//! design that could reorder those two would desynchronise the pairing.
//!
//! The queue is an owned value: entering Pub/Sub mode moves it into the
//! subscriber-mode router and exiting moves it back, never copying.
//! A transfer is only legal while the queue is empty.

use std::collections::VecDeque;

use cinder_protocol::Value;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::metrics;

/// Single-shot handle fulfilled with the command's outcome.
pub(crate) type Completion = oneshot::Sender<Result<Value, Error>>;

/// The ordered queue of commands sent but not yet answered.
///
/// Invariant: `len()` equals the number of requests on the wire without
/// a reply.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    queue: VecDeque<Completion>,
}

impl InFlight {
    pub fn new() -> InFlight {
        InFlight {
            queue: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueues the completion for a command that is being written.
    pub fn push(&mut self, completion: Completion) {
        self.queue.push_back(completion);
    }

    /// Pairs one inbound value with the oldest outstanding command:
    /// an `Error` frame fails it, anything else fulfils it. Exactly one
    /// completion fires either way.
    ///
    /// A value arriving with nothing outstanding means the FIFO pairing
    /// is broken; that is fatal to the connection.
    pub fn resolve(&mut self, value: Value) -> Result<(), Error> {
        let Some(completion) = self.queue.pop_front() else {
            tracing::error!(
                kind = value.kind(),
                "reply received with no outstanding command"
            );
            return Err(Error::UnexpectedReply);
        };

        match value {
            Value::Error(text) => {
                metrics::on_command_failed();
                // receiver may have been dropped; that loses nothing
                let _ = completion.send(Err(Error::Server(text)));
            }
            value => {
                metrics::on_command_succeeded();
                let _ = completion.send(Ok(value));
            }
        }
        Ok(())
    }

    /// Moves every completion of `other` onto the back of this queue,
    /// preserving order. Used when commands staged during a mode switch
    /// join the transferred queue.
    pub fn append(&mut self, other: &mut InFlight) {
        self.queue.append(&mut other.queue);
    }

    /// Fails every pending completion with a clone of the same error.
    /// Used when the connection dies.
    pub fn drain_with(&mut self, error: &Error) {
        while let Some(completion) = self.queue.pop_front() {
            metrics::on_command_failed();
            let _ = completion.send(Err(error.clone()));
        }
    }
}
