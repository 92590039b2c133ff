//! cinder: a non-blocking client for RESP2 servers.
//!
//! One connection is one spawned task; commands from any number of
//! cloned [`Client`] handles are pipelined over it and complete in
//! submission order. Stream commands decode into typed structs, and
//! SUBSCRIBE/PSUBSCRIBE switch the connection into subscriber mode with
//! per-channel callbacks.
//!
//! ```no_run
//! use cinder::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cinder::Error> {
//!     let client = Client::connect("127.0.0.1", 6379).await?;
//!
//!     client.set("greeting", "hello").await?;
//!     assert_eq!(client.get("greeting").await?.as_deref(), Some("hello"));
//!
//!     let id = client.xadd("events", &[("kind", "login")]).await?;
//!     println!("appended {id}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
mod connection;
pub mod convert;
pub mod error;
mod metrics;
mod pipeline;
mod pubsub;
pub mod streams;

pub use client::{Client, XClaimOptions};
pub use command::{CommandArgs, ToArg};
pub use config::ClientConfig;
pub use convert::{labelled_field, FromValue, FromValueOptional};
pub use error::{DecodeError, Error};
pub use pubsub::{MessageHandler, SubscriptionId};
pub use streams::{
    ConsumerInfo, GroupInfo, PendingEntry, PendingSummary, StreamEntry, StreamInfo,
    StreamReadReply,
};

pub use cinder_protocol::{Decoder, ProtocolError, Value};
