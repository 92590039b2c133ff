//! End-to-end scenarios for ordinary commands.

use cinder::{CommandArgs, Error, Value};

use crate::helpers::connected_pair;

#[tokio::test]
async fn ping_pong() {
    let (client, mut server) = connected_pair().await;

    let (reply, ()) = tokio::join!(client.ping(), async {
        server.expect_argv(&["PING"]).await;
        server.send_raw(b"+PONG\r\n").await;
    });
    assert_eq!(reply.unwrap(), "PONG");
}

#[tokio::test]
async fn get_miss_is_none() {
    let (client, mut server) = connected_pair().await;

    let (reply, ()) = tokio::join!(client.get("k"), async {
        server.expect_argv(&["GET", "k"]).await;
        server.send_raw(b"$-1\r\n").await;
    });
    assert_eq!(reply.unwrap(), None);
}

#[tokio::test]
async fn get_hit_decodes_utf8() {
    let (client, mut server) = connected_pair().await;

    let (reply, ()) = tokio::join!(client.get("k"), async {
        server.expect_argv(&["GET", "k"]).await;
        server.send_raw(b"$5\r\nhello\r\n").await;
    });
    assert_eq!(reply.unwrap(), Some("hello".to_owned()));
}

#[tokio::test]
async fn set_ok_is_true() {
    let (client, mut server) = connected_pair().await;

    let (reply, ()) = tokio::join!(client.set("k", "v"), async {
        server.expect_argv(&["SET", "k", "v"]).await;
        server.send_raw(b"+OK\r\n").await;
    });
    assert!(reply.unwrap());
}

#[tokio::test]
async fn server_error_fails_command_but_not_connection() {
    let (client, mut server) = connected_pair().await;

    let (reply, ()) = tokio::join!(client.incr("notanumber"), async {
        server.expect_argv(&["INCR", "notanumber"]).await;
        server.send_raw(b"-ERR value is not an integer\r\n").await;
    });
    match reply.unwrap_err() {
        Error::Server(text) => assert_eq!(text, "ERR value is not an integer"),
        other => panic!("expected server error, got {other:?}"),
    }

    // same connection keeps working
    let (reply, ()) = tokio::join!(client.ping(), async {
        server.expect_argv(&["PING"]).await;
        server.send_raw(b"+PONG\r\n").await;
    });
    assert_eq!(reply.unwrap(), "PONG");
}

#[tokio::test]
async fn echo_returns_exact_bytes() {
    let (client, mut server) = connected_pair().await;

    let (reply, ()) = tokio::join!(client.echo("payload"), async {
        server.expect_argv(&["ECHO", "payload"]).await;
        server.send_raw(b"$7\r\npayload\r\n").await;
    });
    assert_eq!(&reply.unwrap()[..], b"payload");
}

#[tokio::test]
async fn binary_values_survive_the_round_trip() {
    let (client, mut server) = connected_pair().await;

    let payload: &[u8] = b"\x00\x01\xff\r\n";
    let (reply, ()) = tokio::join!(
        client.command(CommandArgs::new("GET").arg("bin")),
        async {
            server.expect_argv(&["GET", "bin"]).await;
            server.send_raw(b"$5\r\n\x00\x01\xff\r\n\r\n").await;
        }
    );
    match reply.unwrap() {
        Value::Bulk(Some(data)) => assert_eq!(&data[..], payload),
        other => panic!("expected bulk, got {other:?}"),
    }
}

#[tokio::test]
async fn quit_acknowledges_then_closes() {
    let (client, mut server) = connected_pair().await;

    let (reply, ()) = tokio::join!(client.quit(), async {
        server.expect_argv(&["QUIT"]).await;
        server.send_raw(b"+OK\r\n").await;
    });
    reply.unwrap();

    server.close().await;

    // whether the EOF has been observed yet or not, the next command
    // fails with the connection-closed error
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
}

#[tokio::test]
async fn ttl_and_expire() {
    let (client, mut server) = connected_pair().await;

    let (set, ()) = tokio::join!(client.expire("k", 60), async {
        server.expect_argv(&["EXPIRE", "k", "60"]).await;
        server.send_raw(b":1\r\n").await;
    });
    assert!(set.unwrap());

    let (ttl, ()) = tokio::join!(client.ttl("k"), async {
        server.expect_argv(&["TTL", "k"]).await;
        server.send_raw(b":42\r\n").await;
    });
    assert_eq!(ttl.unwrap(), 42);
}
