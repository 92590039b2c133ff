//! Test helpers: a scripted mock server the client talks real TCP to.
//!
//! Each test accepts one connection and plays the server side by hand:
//! read a command, assert its argv, write reply bytes (whole, chunked,
//! or malformed). Nothing here validates commands — the tests own the
//! entire conversation.

use bytes::BytesMut;
use cinder::{Client, Decoder, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One scripted server-side connection.
pub struct MockServer {
    stream: TcpStream,
    decoder: Decoder,
}

/// Starts a listener on a random port, connects a client to it, and
/// returns both ends.
pub async fn connected_pair() -> (Client, MockServer) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (accepted, client) = tokio::join!(listener.accept(), Client::connect("127.0.0.1", port));
    let (stream, _) = accepted.unwrap();

    (
        client.unwrap(),
        MockServer {
            stream,
            decoder: Decoder::new(),
        },
    )
}

impl MockServer {
    /// Reads the next complete command the client sent.
    pub async fn read_command(&mut self) -> Value {
        loop {
            if let Some(value) = self.decoder.decode().unwrap() {
                return value;
            }
            let n = self
                .stream
                .read_buf(self.decoder.buffer_mut())
                .await
                .unwrap();
            if n == 0 {
                panic!("client closed the connection while a command was expected");
            }
        }
    }

    /// Reads the next command and asserts its argv tokens.
    pub async fn expect_argv(&mut self, expected: &[&str]) {
        let value = self.read_command().await;
        assert_eq!(argv_strings(&value), expected, "unexpected command");
    }

    /// Writes raw reply bytes exactly as given.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Serializes and writes one reply value.
    pub async fn send_value(&mut self, value: &Value) {
        let mut buf = BytesMut::new();
        value.serialize(&mut buf);
        self.stream.write_all(&buf).await.unwrap();
    }

    /// Closes the server side of the connection.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Renders a decoded command (array of bulk strings) as plain tokens.
pub fn argv_strings(value: &Value) -> Vec<String> {
    let Value::Array(Some(items)) = value else {
        panic!("command is not an array: {value:?}");
    };
    items
        .iter()
        .map(|item| match item {
            Value::Bulk(Some(data)) => String::from_utf8_lossy(data).into_owned(),
            other => panic!("command argument is not a bulk string: {other:?}"),
        })
        .collect()
}

/// Builds an array of bulk strings, the shape of Pub/Sub push frames.
pub fn bulk_array(parts: &[&str]) -> Value {
    Value::array(parts.iter().map(|p| Value::bulk((*p).to_owned())).collect())
}

/// Builds a `[kind, channel, count]` subscription-change frame.
pub fn confirmation(kind: &str, channel: &str, active: i64) -> Value {
    Value::array(vec![
        Value::bulk(kind.to_owned()),
        Value::bulk(channel.to_owned()),
        Value::Integer(active),
    ])
}
