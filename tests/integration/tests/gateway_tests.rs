//! Gateway Integration Tests
//!
//! Each test starts a server on an ephemeral port and talks to it over a
//! real WebSocket.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use futures_util::future::join_all;
use integration_tests::{test_config, TestServer};
use reqwest::StatusCode;
use serde_json::json;
use sio_core::{Arg, ArgShape, Handler, Packet, PacketType};
use sio_gateway::Socket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// HTTP
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start(|_| {}).await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_plain_get_on_socket_path_is_rejected() {
    let server = TestServer::start(|_| {}).await.unwrap();
    let response = server.get("/socket.io/").await.unwrap();
    assert!(response.status().is_client_error());
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_chat_message_is_acknowledged() {
    let server = TestServer::start(|server| {
        server.on(
            "chat message",
            Handler::new(&[ArgShape::String], |_socket: Socket, args: Vec<Arg>| async move {
                Arg::from(format!("echo: {}", args[0].as_str().unwrap_or_default()))
            }),
        );
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    client.send_text("0/chat,").await.unwrap();
    let connected = client.recv().await.unwrap();
    assert_eq!(connected.packet_type, PacketType::Connect);
    assert_eq!(connected.namespace, "/chat");

    client
        .send_text(r#"2/chat,5["chat message","hi"]"#)
        .await
        .unwrap();
    let ack = client.recv().await.unwrap();
    assert_eq!(ack.packet_type, PacketType::Ack);
    assert_eq!(ack.id, Some(5));
    assert_eq!(ack.data, vec![json!("echo: hi")]);
}

#[tokio::test]
async fn test_missing_arguments_are_padded() {
    let server = TestServer::start(|server| {
        server.on(
            "triple",
            Handler::new(
                &[ArgShape::String, ArgShape::Integer, ArgShape::Any],
                |_socket: Socket, args: Vec<Arg>| async move {
                    let absent = args.iter().filter(|a| a.is_absent()).count();
                    Arg::from(absent)
                },
            ),
        );
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    client.send_text(r#"21["triple","only"]"#).await.unwrap();
    let ack = client.recv().await.unwrap();
    assert_eq!(ack.data, vec![json!(2)]);
}

#[tokio::test]
async fn test_binary_event_round_trip() {
    let server = TestServer::start(|server| {
        server.on(
            "upload",
            Handler::new(&[ArgShape::Binary], |_socket: Socket, args: Vec<Arg>| async move {
                let mut bytes = args[0].as_bytes().unwrap_or_default().to_vec();
                bytes.reverse();
                Arg::from(bytes)
            }),
        );
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    let upload = Packet::event("/", "upload", vec![Arg::from(vec![1_u8, 2, 3])], Some(9));
    client.send(&upload).await.unwrap();

    let ack = client.recv().await.unwrap();
    assert_eq!(ack.packet_type, PacketType::BinaryAck);
    assert_eq!(ack.id, Some(9));
    assert_eq!(ack.attachments, vec![vec![3_u8, 2, 1]]);
}

#[tokio::test]
async fn test_concurrent_binary_emits_arrive_whole() {
    let server = TestServer::start(|server| {
        server.on(
            "burst",
            Handler::new(&[], |socket: Socket, _args| async move {
                let emits = (0..8_u8).map(|i| {
                    let socket = socket.clone();
                    async move {
                        let args = vec![Arg::from(u32::from(i)), Arg::from(vec![i; 3])];
                        socket.emit("chunk", args).await
                    }
                });
                for result in join_all(emits).await {
                    result.expect("emit failed");
                }
            }),
        );
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    client.send_text(r#"2["burst"]"#).await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..8 {
        let chunk = client.recv().await.unwrap();
        assert_eq!(chunk.packet_type, PacketType::BinaryEvent);
        let i = chunk.data[1].as_u64().unwrap() as u8;
        assert_eq!(chunk.attachments, vec![vec![i; 3]]);
        seen.push(i);
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..8).collect::<Vec<u8>>());
}

#[tokio::test]
async fn test_disconnect_leaves_rooms_and_fires_once() {
    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = disconnects.clone();
    let server = TestServer::start(move |server| {
        server.on_connection(Handler::new(&[], |socket: Socket, _args| async move {
            socket.join("lobby").await;
        }));
        server.on(
            "disconnect",
            Handler::new(&[], move |_socket: Socket, _args| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            }),
        );
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    server
        .wait_for(|s| async move { s.room_member_count("lobby").await == 1 })
        .await
        .unwrap();

    client.send_text("1").await.unwrap();
    assert!(client.is_closed().await);
    server
        .wait_for(|s| async move { s.session_count() == 0 })
        .await
        .unwrap();

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(server.server.room_count().await, 0);
}

#[tokio::test]
async fn test_lobby_broadcast_skips_sender() {
    let server = TestServer::start(|server| {
        server.on_connection(Handler::new(&[], |socket: Socket, _args| async move {
            socket.join("lobby").await;
        }));
        server.on(
            "ping",
            Handler::new(&[ArgShape::Any], |socket: Socket, args: Vec<Arg>| async move {
                socket.broadcast_to("lobby", "ping", args).await;
            }),
        );
    })
    .await
    .unwrap();

    let mut a = server.connect().await.unwrap();
    let mut b = server.connect().await.unwrap();
    server
        .wait_for(|s| async move { s.room_member_count("lobby").await == 2 })
        .await
        .unwrap();

    a.send_text(r#"2["ping",{"from":"a"}]"#).await.unwrap();
    let ping = b.recv().await.unwrap();
    assert_eq!(ping.event_name(), Some("ping"));
    assert_eq!(ping.data[1], json!({"from": "a"}));

    // A only sees its own follow-up ack, never its broadcast.
    a.send_text(r#"27["ping",null]"#).await.unwrap();
    let ack = a.recv().await.unwrap();
    assert_eq!(ack.packet_type, PacketType::Ack);
    assert_eq!(ack.id, Some(7));
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    let server = TestServer::start(move |server| {
        server.on_error(move |_socket, error| {
            if error.is_fatal() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    client.send_text("2[not json").await.unwrap();
    assert!(client.is_closed().await);
    server
        .wait_for(|s| async move { s.session_count() == 0 })
        .await
        .unwrap();
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_emit_with_ack() {
    let answers = Arc::new(recorded::Answers::default());
    let sink = answers.clone();
    let server = TestServer::start(move |server| {
        server.on(
            "ready",
            Handler::new(&[], move |socket: Socket, _args| {
                let sink = sink.clone();
                async move {
                    let callback = Handler::new(
                        &[ArgShape::Integer],
                        move |_socket: Socket, args: Vec<Arg>| {
                            sink.push(args[0].clone());
                            async {}
                        },
                    );
                    let _ = socket.emit_with_ack("count", Vec::new(), callback).await;
                }
            }),
        );
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    client.send_text(r#"2["ready"]"#).await.unwrap();

    let question = client.recv().await.unwrap();
    assert_eq!(question.event_name(), Some("count"));
    let id = question.id.expect("ack id requested");
    client
        .send(&Packet::ack("/", id, vec![Arg::from(3)]))
        .await
        .unwrap();
    client.send_text("1").await.unwrap();
    assert!(client.is_closed().await);

    assert_eq!(answers.take(), vec![Arg::from(3)]);
}

#[tokio::test]
async fn test_empty_ack_suppressed_by_config() {
    let config = test_config(&[("SOCKETIO_ACK_EMPTY_RESULTS", "false")]).unwrap();
    let server = TestServer::start_with_config(config, |server| {
        server.on("noop", Handler::new(&[], |_socket: Socket, _args| async {}));
        server.on(
            "value",
            Handler::new(&[], |_socket: Socket, _args| async { Arg::from(true) }),
        );
    })
    .await
    .unwrap();

    let mut client = server.connect().await.unwrap();
    client.send_text(r#"21["noop"]"#).await.unwrap();
    client.send_text(r#"22["value"]"#).await.unwrap();
    let ack = client.recv().await.unwrap();
    assert_eq!(ack.id, Some(2));
    client.close().await.unwrap();
}

mod recorded {
    use parking_lot::Mutex;
    use sio_core::Arg;

    /// Values recorded by ack callbacks
    #[derive(Default)]
    pub struct Answers(Mutex<Vec<Arg>>);

    impl Answers {
        pub fn push(&self, value: Arg) {
            self.0.lock().push(value);
        }

        pub fn take(&self) -> Vec<Arg> {
            std::mem::take(&mut *self.0.lock())
        }
    }
}
