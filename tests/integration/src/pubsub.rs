//! Subscriber-mode behaviour over a scripted connection.

use bytes::Bytes;
use cinder::{Error, Value};
use tokio::sync::mpsc;

use crate::helpers::{bulk_array, confirmation, connected_pair};

#[tokio::test]
async fn subscribe_receives_pushed_messages() {
    let (client, mut server) = connected_pair().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (id, ()) = tokio::join!(
        client.subscribe(&["events"], move |channel, payload| {
            let _ = tx.send((channel.to_owned(), payload.clone()));
        }),
        async {
            server.expect_argv(&["SUBSCRIBE", "events"]).await;
            server.send_value(&confirmation("subscribe", "events", 1)).await;
        }
    );
    id.unwrap();

    // unsolicited pushes, no command outstanding
    server
        .send_value(&bulk_array(&["message", "events", "first"]))
        .await;
    server
        .send_value(&bulk_array(&["message", "events", "second"]))
        .await;

    let (channel, payload) = rx.recv().await.unwrap();
    assert_eq!(channel, "events");
    assert_eq!(payload, Bytes::from_static(b"first"));

    let (_, payload) = rx.recv().await.unwrap();
    assert_eq!(
        payload,
        Bytes::from_static(b"second"),
        "messages arrive in server delivery order"
    );
}

#[tokio::test]
async fn message_for_other_channel_is_not_delivered() {
    let (client, mut server) = connected_pair().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (id, ()) = tokio::join!(
        client.subscribe(&["mine"], move |channel, payload| {
            let _ = tx.send((channel.to_owned(), payload.clone()));
        }),
        async {
            server.expect_argv(&["SUBSCRIBE", "mine"]).await;
            server.send_value(&confirmation("subscribe", "mine", 1)).await;
        }
    );
    id.unwrap();

    server
        .send_value(&bulk_array(&["message", "other", "ignored"]))
        .await;
    server
        .send_value(&bulk_array(&["message", "mine", "kept"]))
        .await;

    let (channel, payload) = rx.recv().await.unwrap();
    assert_eq!(channel, "mine");
    assert_eq!(payload, Bytes::from_static(b"kept"));
    assert!(rx.try_recv().is_err(), "no delivery for the other channel");
}

#[tokio::test]
async fn pattern_subscription_delivers_concrete_channel() {
    let (client, mut server) = connected_pair().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (id, ()) = tokio::join!(
        client.psubscribe(&["user:*"], move |channel, payload| {
            let _ = tx.send((channel.to_owned(), payload.clone()));
        }),
        async {
            server.expect_argv(&["PSUBSCRIBE", "user:*"]).await;
            server.send_value(&confirmation("psubscribe", "user:*", 1)).await;
        }
    );
    id.unwrap();

    server
        .send_value(&bulk_array(&["pmessage", "user:*", "user:login", "alice"]))
        .await;

    let (channel, payload) = rx.recv().await.unwrap();
    assert_eq!(channel, "user:login");
    assert_eq!(payload, Bytes::from_static(b"alice"));
}

#[tokio::test]
async fn subscribing_twice_runs_both_handlers() {
    let (client, mut server) = connected_pair().await;
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();

    let (id, ()) = tokio::join!(
        client.subscribe(&["ch"], move |_, payload| {
            let _ = tx_a.send(payload.clone());
        }),
        async {
            server.expect_argv(&["SUBSCRIBE", "ch"]).await;
            server.send_value(&confirmation("subscribe", "ch", 1)).await;
        }
    );
    id.unwrap();

    let (id, ()) = tokio::join!(
        client.subscribe(&["ch"], move |_, payload| {
            let _ = tx_b.send(payload.clone());
        }),
        async {
            server.expect_argv(&["SUBSCRIBE", "ch"]).await;
            server.send_value(&confirmation("subscribe", "ch", 1)).await;
        }
    );
    id.unwrap();

    server.send_value(&bulk_array(&["message", "ch", "x"])).await;

    assert_eq!(rx_a.recv().await.unwrap(), Bytes::from_static(b"x"));
    assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"x"));
}

#[tokio::test]
async fn non_whitelisted_commands_are_rejected_while_subscribed() {
    let (client, mut server) = connected_pair().await;

    let (id, ()) = tokio::join!(client.subscribe(&["ch"], |_, _| {}), async {
        server.expect_argv(&["SUBSCRIBE", "ch"]).await;
        server.send_value(&confirmation("subscribe", "ch", 1)).await;
    });
    id.unwrap();

    match client.set("k", "v").await.unwrap_err() {
        Error::NotPermittedWhileSubscribed(verb) => assert_eq!(verb, "SET"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_is_whitelisted_while_subscribed() {
    let (client, mut server) = connected_pair().await;

    let (id, ()) = tokio::join!(client.subscribe(&["ch"], |_, _| {}), async {
        server.expect_argv(&["SUBSCRIBE", "ch"]).await;
        server.send_value(&confirmation("subscribe", "ch", 1)).await;
    });
    id.unwrap();

    let (reply, ()) = tokio::join!(client.ping(), async {
        server.expect_argv(&["PING"]).await;
        server.send_raw(b"+PONG\r\n").await;
    });
    assert_eq!(reply.unwrap(), "PONG");
}

#[tokio::test]
async fn push_interleaved_with_whitelisted_reply() {
    let (client, mut server) = connected_pair().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (id, ()) = tokio::join!(
        client.subscribe(&["ch"], move |_, payload| {
            let _ = tx.send(payload.clone());
        }),
        async {
            server.expect_argv(&["SUBSCRIBE", "ch"]).await;
            server.send_value(&confirmation("subscribe", "ch", 1)).await;
        }
    );
    id.unwrap();

    let (reply, ()) = tokio::join!(client.ping(), async {
        server.expect_argv(&["PING"]).await;
        // a push sneaks in ahead of the PING reply
        server.send_value(&bulk_array(&["message", "ch", "early"])).await;
        server.send_raw(b"+PONG\r\n").await;
    });
    assert_eq!(reply.unwrap(), "PONG");
    assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"early"));
}

#[tokio::test]
async fn unsubscribe_to_zero_restores_request_mode() {
    let (client, mut server) = connected_pair().await;

    let (id, ()) = tokio::join!(client.subscribe(&["ch"], |_, _| {}), async {
        server.expect_argv(&["SUBSCRIBE", "ch"]).await;
        server.send_value(&confirmation("subscribe", "ch", 1)).await;
    });
    id.unwrap();

    let (done, ()) = tokio::join!(client.unsubscribe(&["ch"]), async {
        server.expect_argv(&["UNSUBSCRIBE", "ch"]).await;
        server.send_value(&confirmation("unsubscribe", "ch", 0)).await;
    });
    done.unwrap();

    // back in request mode: ordinary commands flow again
    let (reply, ()) = tokio::join!(client.get("k"), async {
        server.expect_argv(&["GET", "k"]).await;
        server.send_raw(b"$1\r\nv\r\n").await;
    });
    assert_eq!(reply.unwrap(), Some("v".to_owned()));
}

#[tokio::test]
async fn handler_token_unsubscribes_selectively() {
    let (client, mut server) = connected_pair().await;
    let (tx_keep, mut rx_keep) = mpsc::unbounded_channel();
    let (tx_gone, mut rx_gone) = mpsc::unbounded_channel();

    let (keep, ()) = tokio::join!(
        client.subscribe(&["ch"], move |_, payload| {
            let _ = tx_keep.send(payload.clone());
        }),
        async {
            server.expect_argv(&["SUBSCRIBE", "ch"]).await;
            server.send_value(&confirmation("subscribe", "ch", 1)).await;
        }
    );
    keep.unwrap();

    let (gone, ()) = tokio::join!(
        client.subscribe(&["ch", "solo"], move |_, payload| {
            let _ = tx_gone.send(payload.clone());
        }),
        async {
            server.expect_argv(&["SUBSCRIBE", "ch", "solo"]).await;
            server.send_value(&confirmation("subscribe", "ch", 1)).await;
            server.send_value(&confirmation("subscribe", "solo", 2)).await;
        }
    );
    let gone = gone.unwrap();

    // dropping the second registration frees "solo" on the wire but
    // leaves "ch" subscribed for the first handler
    let (done, ()) = tokio::join!(client.unsubscribe_id(gone), async {
        server.expect_argv(&["UNSUBSCRIBE", "solo"]).await;
        server.send_value(&confirmation("unsubscribe", "solo", 1)).await;
    });
    done.unwrap();

    server.send_value(&bulk_array(&["message", "ch", "still-here"])).await;
    assert_eq!(rx_keep.recv().await.unwrap(), Bytes::from_static(b"still-here"));
    assert!(rx_gone.try_recv().is_err());
}

#[tokio::test]
async fn unknown_push_shape_is_treated_as_reply() {
    let (client, mut server) = connected_pair().await;

    let (id, ()) = tokio::join!(client.subscribe(&["ch"], |_, _| {}), async {
        server.expect_argv(&["SUBSCRIBE", "ch"]).await;
        server.send_value(&confirmation("subscribe", "ch", 1)).await;
    });
    id.unwrap();

    // a whitelisted command whose reply is a three-element array that
    // isn't a known push kind: it must resolve the command, not die
    let (reply, ()) = tokio::join!(
        client.command(cinder::CommandArgs::new("PING")),
        async {
            server.expect_argv(&["PING"]).await;
            server.send_value(&bulk_array(&["pong", "", "extra"])).await;
        }
    );
    assert_eq!(
        reply.unwrap(),
        Value::array(vec![
            Value::bulk("pong"),
            Value::bulk(""),
            Value::bulk("extra"),
        ])
    );
}
