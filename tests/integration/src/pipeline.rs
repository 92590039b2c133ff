//! Pipelining behaviour: FIFO pairing, chunked replies, drain on error.

use cinder::{CommandArgs, Error, Value};

use crate::helpers::connected_pair;

#[tokio::test]
async fn many_in_flight_commands_complete_in_order() {
    let (client, mut server) = connected_pair().await;

    let futures: Vec<_> = (0..5)
        .map(|i| client.command(CommandArgs::new("GET").arg(format!("key{i}"))))
        .collect();

    let script = async {
        for i in 0..5 {
            server.expect_argv(&["GET", &format!("key{i}")]).await;
        }
        for i in 0..5 {
            server
                .send_raw(format!("$4\r\nval{i}\r\n").as_bytes())
                .await;
        }
    };

    let (replies, ()) = tokio::join!(futures_join(futures), script);
    for (i, reply) in replies.into_iter().enumerate() {
        assert_eq!(reply.unwrap(), Value::bulk(format!("val{i}")));
    }
}

#[tokio::test]
async fn replies_split_at_arbitrary_chunk_boundaries() {
    let (client, mut server) = connected_pair().await;

    let first = client.command(CommandArgs::new("GET").arg("a"));
    let second = client.command(CommandArgs::new("GET").arg("b"));
    let third = client.command(CommandArgs::new("LRANGE").arg("l").arg(0i64).arg(-1i64));

    let script = async {
        server.expect_argv(&["GET", "a"]).await;
        server.expect_argv(&["GET", "b"]).await;
        server.expect_argv(&["LRANGE", "l", "0", "-1"]).await;

        // one bulk reply, one integer, one nested array — written in
        // fragments that split values, length prefixes and CRLFs
        let all = b"$5\r\nhello\r\n:42\r\n*2\r\n$1\r\nx\r\n$1\r\ny\r\n";
        for chunk in all.chunks(3) {
            server.send_raw(chunk).await;
        }
    };

    let (r1, r2, r3, ()) = tokio::join!(first, second, third, script);
    assert_eq!(r1.unwrap(), Value::bulk("hello"));
    assert_eq!(r2.unwrap(), Value::Integer(42));
    assert_eq!(
        r3.unwrap(),
        Value::array(vec![Value::bulk("x"), Value::bulk("y")])
    );
}

#[tokio::test]
async fn malformed_frame_fails_every_pending_command() {
    let (client, mut server) = connected_pair().await;

    let futures: Vec<_> = (0..3)
        .map(|i| client.command(CommandArgs::new("GET").arg(format!("k{i}"))))
        .collect();

    let script = async {
        for i in 0..3 {
            server.expect_argv(&["GET", &format!("k{i}")]).await;
        }
        server.send_raw(b"~framing is gone\r\n").await;
    };

    let (replies, ()) = tokio::join!(futures_join(futures), script);
    for reply in replies {
        assert!(
            matches!(reply.unwrap_err(), Error::Protocol(_)),
            "every pending command shares the protocol error"
        );
    }

    // the connection is closed: submissions fail without touching the wire
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
}

#[tokio::test]
async fn server_disconnect_mid_pipeline_drains_the_queue() {
    let (client, mut server) = connected_pair().await;

    let first = client.command(CommandArgs::new("GET").arg("a"));
    let second = client.command(CommandArgs::new("GET").arg("b"));

    let script = async {
        server.expect_argv(&["GET", "a"]).await;
        server.expect_argv(&["GET", "b"]).await;
        // answer one, then vanish
        server.send_raw(b"$1\r\na\r\n").await;
        server.close().await;
    };

    let (r1, r2, ()) = tokio::join!(first, second, script);
    assert_eq!(r1.unwrap(), Value::bulk("a"));
    assert!(matches!(r2.unwrap_err(), Error::ConnectionClosed));
}

#[tokio::test]
async fn interleaved_submit_and_reply() {
    let (client, mut server) = connected_pair().await;

    let (r1, ()) = tokio::join!(client.incr("counter"), async {
        server.expect_argv(&["INCR", "counter"]).await;
        server.send_raw(b":1\r\n").await;
    });
    assert_eq!(r1.unwrap(), 1);

    let (r2, r3, ()) = tokio::join!(
        client.incr("counter"),
        client.incr("counter"),
        async {
            server.expect_argv(&["INCR", "counter"]).await;
            server.expect_argv(&["INCR", "counter"]).await;
            server.send_raw(b":2\r\n:3\r\n").await;
        }
    );
    assert_eq!(r2.unwrap(), 2);
    assert_eq!(r3.unwrap(), 3);
}

/// Awaits a vec of command futures, preserving order.
async fn futures_join<F>(futures: Vec<F>) -> Vec<F::Output>
where
    F: std::future::Future,
{
    let mut out = Vec::with_capacity(futures.len());
    for f in futures {
        out.push(f.await);
    }
    out
}
