//! Socket.IO server
//!
//! Owns the handler template every new session is forked from, the room
//! registry and the directory of live sessions.

use crate::broadcast::{room_key, LocalRoomRegistry, RoomRegistry};
use crate::error::SocketError;
use crate::socket::{ErrorHandler, Session, SessionOptions, Socket};
use crate::transport::TransportConnection;
use dashmap::DashMap;
use parking_lot::RwLock;
use sio_common::SocketIoConfig;
use sio_core::{AnyHandler, Arg, EventRouter, Handler, CONNECTION_EVENT};
use std::sync::Arc;

struct ServerInner {
    template: RwLock<EventRouter<Socket>>,
    registry: Arc<dyn RoomRegistry>,
    on_error: RwLock<Option<ErrorHandler>>,
    sessions: DashMap<String, Socket>,
    config: SocketIoConfig,
}

/// Accepts connections and runs their sessions
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(SocketIoConfig::default())
    }
}

impl Server {
    /// Create a server with an in-process room registry
    #[must_use]
    pub fn new(config: SocketIoConfig) -> Self {
        Self::with_registry(config, LocalRoomRegistry::new_shared())
    }

    /// Create a server using `registry` for room membership and fan-out
    #[must_use]
    pub fn with_registry(config: SocketIoConfig, registry: Arc<dyn RoomRegistry>) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                template: RwLock::new(EventRouter::new()),
                registry,
                on_error: RwLock::new(None),
                sessions: DashMap::new(),
                config,
            }),
        }
    }

    /// Register the handler run once for every new session, before its
    /// first packet is read
    pub fn on_connection(&self, handler: Handler<Socket>) {
        self.on(CONNECTION_EVENT, handler);
    }

    /// Register a handler in the template. Sessions accepted afterwards
    /// start with it; live sessions are unaffected.
    pub fn on(&self, event: impl Into<String>, handler: Handler<Socket>) {
        self.inner.template.write().register(event, handler);
    }

    /// Register a catch-all observer in the template
    pub fn on_any(&self, handler: AnyHandler<Socket>) {
        self.inner.template.write().register_any(handler);
    }

    /// Observe handler errors, argument decode failures and fatal session
    /// errors
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(Socket, SocketError) + Send + Sync + 'static,
    {
        *self.inner.on_error.write() = Some(Arc::new(f));
    }

    /// Send an event to every member of `room` in the configured namespace
    pub async fn broadcast_to(&self, room: &str, event: &str, args: Vec<Arg>) {
        let key = room_key(&self.inner.config.namespace, room);
        self.inner.registry.send(None, &key, event, args).await;
    }

    /// Run a session on `connection` until it terminates
    pub async fn serve(&self, connection: TransportConnection) {
        let TransportConnection {
            id,
            request,
            reader,
            writer,
        } = connection;

        let router = self.inner.template.read().snapshot();
        let socket = Socket::new(
            id.clone(),
            request,
            writer,
            Arc::clone(&self.inner.registry),
            router,
        );
        let options = SessionOptions {
            ack_empty_results: self.inner.config.ack_empty_results,
        };
        let on_error = self.inner.on_error.read().clone();

        self.inner.sessions.insert(id.clone(), socket.clone());
        tracing::debug!(
            session_id = %id,
            sessions = self.inner.sessions.len(),
            "Session registered"
        );

        Session::new(socket, reader, options, on_error).run().await;

        self.inner.sessions.remove(&id);
        tracing::debug!(session_id = %id, "Session removed");
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Look up a live session
    pub fn socket(&self, id: &str) -> Option<Socket> {
        self.inner.sessions.get(id).map(|s| s.clone())
    }

    pub fn registry(&self) -> &Arc<dyn RoomRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &SocketIoConfig {
        &self.inner.config
    }

    /// Members of `room` in the configured namespace
    pub async fn room_member_count(&self, room: &str) -> usize {
        let key = room_key(&self.inner.config.namespace, room);
        self.inner.registry.member_count(&key).await
    }

    /// Number of non-empty rooms across all namespaces
    pub async fn room_count(&self) -> usize {
        self.inner.registry.room_count().await
    }

    /// Registry keys (`namespace,room`) of all non-empty rooms
    pub async fn room_names(&self) -> Vec<String> {
        self.inner.registry.room_names().await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("handlers", &self.inner.template.read().len())
            .field("sessions", &self.inner.sessions.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::delayed::DelayedRegistry;
    use crate::transport::memory::{self, MemoryPeer};
    use sio_core::{ArgShape, HandlerError, Packet, PacketType, Reply};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn spawn(server: &Server, id: &str) -> (JoinHandle<()>, MemoryPeer) {
        let (conn, peer) = memory::pair(id);
        let server = server.clone();
        (tokio::spawn(async move { server.serve(conn).await }), peer)
    }

    async fn next(peer: &mut MemoryPeer) -> Packet {
        timeout(WAIT, peer.recv_packet())
            .await
            .expect("timed out waiting for a packet")
            .expect("transport closed")
            .expect("undecodable packet")
    }

    async fn finish(handle: JoinHandle<()>) {
        timeout(WAIT, handle)
            .await
            .expect("session did not terminate")
            .unwrap();
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (count.clone(), count)
    }

    #[tokio::test]
    async fn test_accept_sends_connect_and_runs_connection_handler() {
        let server = Server::default();
        let (connections, seen) = counter();
        server.on_connection(Handler::new(&[], move |socket: Socket, _args| {
            seen.fetch_add(1, Ordering::SeqCst);
            async move {
                socket.join("lobby").await;
            }
        }));

        let (handle, mut peer) = spawn(&server, "s1");
        let connect = next(&mut peer).await;
        assert_eq!(connect.packet_type, PacketType::Connect);
        assert_eq!(connect.namespace, "/");

        peer.close();
        finish(handle).await;
        assert_eq!(connections.load(Ordering::SeqCst), 1);
        assert_eq!(server.session_count(), 0);
        assert_eq!(server.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_chat_scenario() {
        let server = Server::default();
        let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (disconnects, on_disconnect) = counter();

        let sink = received.clone();
        server.on_connection(Handler::new(&[], move |socket: Socket, _args| {
            let sink = sink.clone();
            let on_disconnect = on_disconnect.clone();
            async move {
                socket.on(
                    "chat message",
                    Handler::new(&[ArgShape::String], move |_socket: Socket, args: Vec<Arg>| {
                        sink.lock().push(args[0].clone());
                        async {}
                    }),
                );
                socket.on(
                    "disconnect",
                    Handler::new(&[], move |_socket: Socket, _args| {
                        on_disconnect.fetch_add(1, Ordering::SeqCst);
                        async {}
                    }),
                );
                socket.join("lobby").await;
            }
        }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text("0/chat,").unwrap();
        let echoed = next(&mut peer).await;
        assert_eq!(echoed.packet_type, PacketType::Connect);
        assert_eq!(echoed.namespace, "/chat");

        peer.send_text(r#"2/chat,5["chat message","hi"]"#).unwrap();
        let ack = next(&mut peer).await;
        assert_eq!(ack.packet_type, PacketType::Ack);
        assert_eq!(ack.namespace, "/chat");
        assert_eq!(ack.id, Some(5));
        assert!(ack.data.is_empty());
        assert_eq!(*received.lock(), vec![Arg::from("hi")]);
        assert_eq!(server.room_names().await, vec!["/chat,lobby"]);

        peer.send_text("1/chat,").unwrap();
        finish(handle).await;

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(server.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_ack_carries_results_and_handler_error() {
        let server = Server::default();
        server.on(
            "divide",
            Handler::new(
                &[ArgShape::Integer, ArgShape::Integer],
                |_socket: Socket, args: Vec<Arg>| async move {
                    let (a, b) = (args[0].as_i64().unwrap_or(0), args[1].as_i64().unwrap_or(0));
                    if b == 0 {
                        Reply {
                            values: vec![Arg::Null],
                            error: Some(HandlerError::new("division by zero")),
                        }
                    } else {
                        Reply::from(Arg::from(a / b))
                    }
                },
            ),
        );
        let errors = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = errors.clone();
        server.on_error(move |_socket, error| sink.lock().push(error.to_string()));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text(r#"21["divide",9,3]"#).unwrap();
        let ok = next(&mut peer).await;
        assert_eq!(ok.id, Some(1));
        assert_eq!(ok.data, vec![serde_json::json!(3)]);

        peer.send_text(r#"22["divide",1,0]"#).unwrap();
        let failed = next(&mut peer).await;
        assert_eq!(failed.id, Some(2));
        assert_eq!(
            failed.data,
            vec![serde_json::Value::Null, serde_json::json!("division by zero")]
        );
        assert_eq!(*errors.lock(), vec!["Handler error: division by zero".to_string()]);

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_argument_error_sends_no_ack_and_keeps_session() {
        let server = Server::default();
        server.on(
            "echo",
            Handler::new(&[ArgShape::String], |_socket: Socket, args: Vec<Arg>| async move {
                args
            }),
        );

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text(r#"27["echo",42]"#).unwrap();
        peer.send_text(r#"28["echo","still here"]"#).unwrap();

        let ack = next(&mut peer).await;
        assert_eq!(ack.id, Some(8));
        assert_eq!(ack.data, vec![serde_json::json!("still here")]);

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_unrouted_event_does_not_stall() {
        let server = Server::default();
        server.on(
            "known",
            Handler::new(&[], |_socket: Socket, _args| async { Arg::from(true) }),
        );

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        // Unrouted binary event with its attachment, then a routed event.
        peer.send_text(r#"51-3["unknown",{"_placeholder":true,"num":0}]"#).unwrap();
        peer.send_frame(sio_core::Frame::Binary(vec![1, 2, 3])).unwrap();
        peer.send_text(r#"24["known"]"#).unwrap();

        let ack = next(&mut peer).await;
        assert_eq!(ack.id, Some(4));
        assert_eq!(ack.data, vec![serde_json::json!(true)]);

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_malformed_frame_terminates_once() {
        let server = Server::default();
        let (disconnects, on_disconnect) = counter();
        server.on(
            "disconnect",
            Handler::new(&[], move |_socket: Socket, _args| {
                on_disconnect.fetch_add(1, Ordering::SeqCst);
                async {}
            }),
        );
        let (fatal, on_fatal) = counter();
        server.on_error(move |_socket, error| {
            if error.is_fatal() {
                on_fatal.fetch_add(1, Ordering::SeqCst);
            }
        });

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text("9garbage").unwrap();
        finish(handle).await;

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(fatal.load(Ordering::SeqCst), 1);
        assert!(timeout(WAIT, peer.recv_frame()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_emit_with_ack_resolves_callback() {
        let server = Server::default();
        let answers = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = answers.clone();
        server.on_connection(Handler::new(&[], move |socket: Socket, _args| {
            let sink = sink.clone();
            async move {
                let callback =
                    Handler::new(&[ArgShape::String], move |_socket: Socket, args: Vec<Arg>| {
                        sink.lock().push(args[0].clone());
                        async {}
                    });
                socket
                    .emit_with_ack("question", vec![Arg::from("name?")], callback)
                    .await
                    .unwrap();
            }
        }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;
        let question = next(&mut peer).await;
        assert_eq!(question.event_name(), Some("question"));
        let id = question.id.unwrap();

        peer.send_packet(&Packet::ack("/", id, vec![Arg::from("bob")])).unwrap();
        // A duplicate and an unknown id are ignored.
        peer.send_packet(&Packet::ack("/", id, vec![Arg::from("again")])).unwrap();
        peer.send_packet(&Packet::ack("/", 999, Vec::new())).unwrap();
        peer.send_text("1").unwrap();
        finish(handle).await;

        assert_eq!(*answers.lock(), vec![Arg::from("bob")]);
    }

    #[tokio::test]
    async fn test_broadcast_between_sessions() {
        let server = Server::default();
        server.on_connection(Handler::new(&[], |socket: Socket, _args| async move {
            socket.join("lobby").await;
            socket.on(
                "shout",
                Handler::new(&[], |socket: Socket, _args| async move {
                    socket.broadcast_to("lobby", "ping", Vec::new()).await;
                }),
            );
        }));

        let (handle_a, mut peer_a) = spawn(&server, "a");
        let (handle_b, mut peer_b) = spawn(&server, "b");
        next(&mut peer_a).await;
        next(&mut peer_b).await;
        timeout(WAIT, async {
            while server.room_member_count("lobby").await < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        peer_a.send_text(r#"2["shout"]"#).unwrap();
        let ping = next(&mut peer_b).await;
        assert_eq!(ping.event_name(), Some("ping"));
        assert_eq!(ping.data.len(), 1);

        peer_a.close();
        peer_b.close();
        finish(handle_a).await;
        finish(handle_b).await;
        assert!(peer_a.try_recv_frame().is_none());
    }

    #[tokio::test]
    async fn test_server_broadcast_reaches_everyone() {
        let server = Server::default();
        server.on_connection(Handler::new(&[], |socket: Socket, _args| async move {
            socket.join("news").await;
        }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;
        timeout(WAIT, async {
            while server.room_member_count("news").await < 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        server.broadcast_to("news", "headline", vec![Arg::from("extra")]).await;
        let packet = next(&mut peer).await;
        assert_eq!(packet.event_name(), Some("headline"));

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_socket_disconnect_from_handler() {
        let server = Server::default();
        let (disconnects, on_disconnect) = counter();
        server.on(
            "bye",
            Handler::new(&[], |socket: Socket, _args| async move {
                let _ = socket.emit("disconnect", Vec::new()).await;
            }),
        );
        server.on(
            "disconnect",
            Handler::new(&[], move |_socket: Socket, _args| {
                on_disconnect.fetch_add(1, Ordering::SeqCst);
                async {}
            }),
        );

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text(r#"2["bye"]"#).unwrap();
        let packet = next(&mut peer).await;
        assert_eq!(packet.packet_type, PacketType::Disconnect);
        finish(handle).await;

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(server.session_count(), 0);
    }

    #[tokio::test]
    async fn test_template_is_copied_per_session() {
        let server = Server::default();
        server.on_connection(Handler::new(&[], |socket: Socket, _args| async move {
            socket.on(
                "private",
                Handler::new(&[], |_socket: Socket, _args| async { Arg::from("mine") }),
            );
        }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;
        assert!(!server.inner.template.read().contains("private"));

        peer.send_text(r#"20["private"]"#).unwrap();
        let ack = next(&mut peer).await;
        assert_eq!(ack.data, vec![serde_json::json!("mine")]);

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_empty_results_not_acked_when_disabled() {
        let config = SocketIoConfig {
            ack_empty_results: false,
            ..SocketIoConfig::default()
        };
        let server = Server::new(config);
        server.on("quiet", Handler::new(&[], |_socket: Socket, _args| async {}));
        server.on("loud", Handler::new(&[], |_socket: Socket, _args| async { Arg::from(1) }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text(r#"21["quiet"]"#).unwrap();
        peer.send_text(r#"22["loud"]"#).unwrap();
        let ack = next(&mut peer).await;
        assert_eq!(ack.id, Some(2));

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_second_namespace_is_rejected() {
        let server = Server::default();
        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text("0/a,").unwrap();
        assert_eq!(next(&mut peer).await.packet_type, PacketType::Connect);

        peer.send_text("0/b,").unwrap();
        let rejected = next(&mut peer).await;
        assert_eq!(rejected.packet_type, PacketType::Error);
        assert_eq!(rejected.namespace, "/b");
        assert_eq!(server.socket("s1").unwrap().namespace(), "/a");

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_ack_uses_session_namespace() {
        let server = Server::default();
        server.on("known", Handler::new(&[], |_socket: Socket, _args| async { Arg::from(1) }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;
        peer.send_text("0/a,").unwrap();
        next(&mut peer).await;

        peer.send_text(r#"2/b,3["known"]"#).unwrap();
        let ack = next(&mut peer).await;
        assert_eq!(ack.packet_type, PacketType::Ack);
        assert_eq!(ack.id, Some(3));
        assert_eq!(ack.namespace, "/a");

        peer.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_teardown_during_slow_join_clears_registry() {
        let registry = DelayedRegistry::new_shared(Duration::from_millis(50));
        let server = Server::with_registry(SocketIoConfig::default(), registry);
        server.on_connection(Handler::new(&[], |socket: Socket, _args| async move {
            tokio::spawn(async move { socket.join("lobby").await });
        }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;
        peer.close();
        finish(handle).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.room_count().await, 0);
        assert!(server.room_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_on_any_sees_events_without_changing_acks() {
        let server = Server::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        server.on_any(AnyHandler::new(move |_socket: Socket, event: String, args: Vec<Arg>| {
            sink.lock().push((event, args.len()));
            async {}
        }));
        server.on("known", Handler::new(&[], |_socket: Socket, _args| async { Arg::from(1) }));

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;

        peer.send_text(r#"2["unknown","a","b"]"#).unwrap();
        peer.send_text(r#"23["known"]"#).unwrap();
        let ack = next(&mut peer).await;
        assert_eq!(ack.data, vec![serde_json::json!(1)]);

        peer.close();
        finish(handle).await;
        assert_eq!(
            *seen.lock(),
            vec![("unknown".to_string(), 2), ("known".to_string(), 0)]
        );
    }

    #[tokio::test]
    async fn test_peer_error_packet_reaches_error_handler() {
        let server = Server::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        server.on(
            "error",
            Handler::new(&[ArgShape::Any], move |_socket: Socket, args: Vec<Arg>| {
                sink.lock().push(args[0].clone());
                async {}
            }),
        );

        let (handle, mut peer) = spawn(&server, "s1");
        next(&mut peer).await;
        peer.send_text(r#"4"not allowed""#).unwrap();
        peer.send_text("1").unwrap();
        finish(handle).await;

        assert_eq!(*seen.lock(), vec![Arg::from("not allowed")]);
    }
}
