//! Socket handle
//!
//! `Socket` is the application's view of one live session. It is a cheap
//! clone around shared state; handlers receive it as their context and may
//! keep it to emit later from other tasks.

use crate::broadcast::{room_key, Member, RoomRegistry};
use crate::error::{SocketError, SocketResult};
use crate::transport::{FrameWriter, RequestInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sio_core::{
    encode, AckId, AckTable, AnyHandler, Arg, ArgumentDecodeError, EventRouter, Handler, Packet,
    Reply, Route, DEFAULT_NAMESPACE, DISCONNECT_EVENT,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Accepted; the peer has not sent its CONNECT yet
    AwaitingConnect,
    /// The peer's CONNECT fixed the namespace
    Established,
    /// Terminal
    Disconnected,
}

impl SocketState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AwaitingConnect => "awaiting_connect",
            Self::Established => "established",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-session mutable state, guarded by one lock
struct SessionState {
    status: SocketState,
    namespace: String,
    /// Logical room name to registry key
    rooms: BTreeMap<String, String>,
    acks: AckTable<Socket>,
    router: EventRouter<Socket>,
}

struct SocketInner {
    id: String,
    request: RequestInfo,
    writer: Arc<dyn FrameWriter>,
    registry: Arc<dyn RoomRegistry>,
    state: Mutex<SessionState>,
    /// Held across registry calls so `rooms` and the registry change together
    membership: tokio::sync::Mutex<()>,
    /// Set once the application asked for the session to close
    closing: AtomicBool,
    close_signal: Notify,
}

impl SocketInner {
    fn namespace(&self) -> String {
        self.state.lock().namespace.clone()
    }

    fn is_disconnected(&self) -> bool {
        self.state.lock().status == SocketState::Disconnected
    }

    async fn send_packet(&self, packet: &Packet) -> SocketResult<()> {
        let frames = encode(packet).map_err(SocketError::Encode)?;
        tracing::trace!(session_id = %self.id, packet = %packet, "Sending packet");
        self.writer.write_frames(frames).await?;
        Ok(())
    }

    async fn emit(&self, event: &str, args: Vec<Arg>) -> SocketResult<()> {
        if event == DISCONNECT_EVENT {
            return self.disconnect().await;
        }
        if self.is_disconnected() {
            return Err(SocketError::Closed);
        }
        self.send_packet(&Packet::event(self.namespace(), event, args, None))
            .await
    }

    async fn disconnect(&self) -> SocketResult<()> {
        if self.is_disconnected() || self.closing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::debug!(session_id = %self.id, "Disconnecting");
        let sent = self.send_packet(&Packet::disconnect(self.namespace())).await;
        self.close_signal.notify_one();
        self.close_transport().await;
        sent
    }

    async fn close_transport(&self) {
        if let Err(e) = self.writer.close().await {
            tracing::debug!(session_id = %self.id, error = %e, "Failed to close transport");
        }
    }
}

#[async_trait]
impl Member for SocketInner {
    fn member_id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, event: &str, args: Vec<Arg>) -> Result<(), SocketError> {
        self.emit(event, args).await
    }
}

/// Handle to one live session
#[derive(Clone)]
pub struct Socket {
    inner: Arc<SocketInner>,
}

impl Socket {
    pub(crate) fn new(
        id: String,
        request: RequestInfo,
        writer: Arc<dyn FrameWriter>,
        registry: Arc<dyn RoomRegistry>,
        router: EventRouter<Socket>,
    ) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                id,
                request,
                writer,
                registry,
                state: Mutex::new(SessionState {
                    status: SocketState::AwaitingConnect,
                    namespace: DEFAULT_NAMESPACE.to_string(),
                    rooms: BTreeMap::new(),
                    acks: AckTable::new(),
                    router,
                }),
                membership: tokio::sync::Mutex::new(()),
                closing: AtomicBool::new(false),
                close_signal: Notify::new(),
            }),
        }
    }

    /// Stable session id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Current namespace
    pub fn namespace(&self) -> String {
        self.inner.namespace()
    }

    /// Rooms this session has joined, sorted
    pub fn rooms(&self) -> Vec<String> {
        self.inner.state.lock().rooms.keys().cloned().collect()
    }

    /// Metadata of the request that opened the connection
    pub fn request(&self) -> &RequestInfo {
        &self.inner.request
    }

    pub fn state(&self) -> SocketState {
        self.inner.state.lock().status
    }

    pub fn is_connected(&self) -> bool {
        !self.inner.is_disconnected()
    }

    /// Register a handler for `event` on this session only, returning the
    /// handler it replaced
    pub fn on(
        &self,
        event: impl Into<String>,
        handler: Handler<Socket>,
    ) -> Option<Handler<Socket>> {
        self.inner.state.lock().router.register(event, handler)
    }

    /// Remove this session's handler for `event`
    pub fn off(&self, event: &str) -> bool {
        self.inner.state.lock().router.unregister(event).is_some()
    }

    /// Register a catch-all observer for every inbound event
    pub fn on_any(&self, handler: AnyHandler<Socket>) {
        self.inner.state.lock().router.register_any(handler);
    }

    /// Send an event to the peer.
    ///
    /// Emitting `"disconnect"` closes the session instead.
    pub async fn emit(&self, event: &str, args: Vec<Arg>) -> SocketResult<()> {
        self.inner.emit(event, args).await
    }

    /// Send an event and run `callback` when the peer acknowledges it
    pub async fn emit_with_ack(
        &self,
        event: &str,
        args: Vec<Arg>,
        callback: Handler<Socket>,
    ) -> SocketResult<AckId> {
        let (namespace, id) = {
            let mut state = self.inner.state.lock();
            if state.status == SocketState::Disconnected {
                return Err(SocketError::Closed);
            }
            (state.namespace.clone(), state.acks.insert(callback))
        };

        let packet = Packet::event(namespace, event, args, Some(id));
        if let Err(e) = self.inner.send_packet(&packet).await {
            self.inner.state.lock().acks.take(id);
            return Err(e);
        }

        tracing::trace!(session_id = %self.id(), ack_id = id, event = %event, "Awaiting ack");
        Ok(id)
    }

    /// Join `room` in this session's namespace. Joining twice is a no-op.
    pub async fn join(&self, room: &str) {
        let _membership = self.inner.membership.lock().await;
        let key = {
            let mut state = self.inner.state.lock();
            if state.status == SocketState::Disconnected || state.rooms.contains_key(room) {
                return;
            }
            let key = room_key(&state.namespace, room);
            state.rooms.insert(room.to_string(), key.clone());
            key
        };

        self.inner.registry.join(&key, self.member()).await;
        tracing::debug!(session_id = %self.id(), room = %room, "Joined room");
    }

    /// Leave `room`
    pub async fn leave(&self, room: &str) {
        let _membership = self.inner.membership.lock().await;
        let key = self.inner.state.lock().rooms.remove(room);
        if let Some(key) = key {
            self.inner.registry.leave(&key, self.id()).await;
            tracing::debug!(session_id = %self.id(), room = %room, "Left room");
        }
    }

    /// Leave every joined room
    pub async fn leave_all(&self) {
        let _membership = self.inner.membership.lock().await;
        let rooms = std::mem::take(&mut self.inner.state.lock().rooms);
        for key in rooms.values() {
            self.inner.registry.leave(key, self.id()).await;
        }
    }

    /// Send an event to every other member of `room`
    pub async fn broadcast_to(&self, room: &str, event: &str, args: Vec<Arg>) {
        let key = room_key(&self.namespace(), room);
        self.inner
            .registry
            .send(Some(self.id()), &key, event, args)
            .await;
    }

    /// Send DISCONNECT to the peer and close the transport. The session's
    /// `"disconnect"` handler runs once the read loop has wound down.
    pub async fn disconnect(&self) -> SocketResult<()> {
        self.inner.disconnect().await
    }

    fn member(&self) -> Arc<dyn Member> {
        Arc::clone(&self.inner) as Arc<dyn Member>
    }

    // ========================================================================
    // Session loop hooks
    // ========================================================================

    pub(crate) async fn send_packet(&self, packet: &Packet) -> SocketResult<()> {
        self.inner.send_packet(packet).await
    }

    pub(crate) fn route(&self, event: &str) -> Route<Socket> {
        self.inner.state.lock().router.route(event)
    }

    /// Consume the ack callback for `id`, if any
    pub(crate) fn take_ack(
        &self,
        id: AckId,
        values: Vec<Value>,
        attachments: Vec<Vec<u8>>,
    ) -> Option<impl Future<Output = Result<Reply, ArgumentDecodeError>>> {
        self.inner
            .state
            .lock()
            .acks
            .resolve(id, self.clone(), values, attachments)
    }

    /// Fix the namespace from the peer's CONNECT.
    ///
    /// The first CONNECT moves the session to `Established`, re-keying any
    /// rooms joined under the previous namespace. A later CONNECT is only
    /// accepted for the same namespace.
    pub(crate) async fn establish(&self, namespace: &str) -> bool {
        let _membership = self.inner.membership.lock().await;
        let moved: Vec<(String, String)> = {
            let mut state = self.inner.state.lock();
            match state.status {
                SocketState::Established => return state.namespace == namespace,
                SocketState::Disconnected => return false,
                SocketState::AwaitingConnect => {}
            }

            state.status = SocketState::Established;
            if state.namespace == namespace {
                Vec::new()
            } else {
                state.namespace = namespace.to_string();
                state
                    .rooms
                    .iter_mut()
                    .map(|(room, key)| {
                        let old = std::mem::replace(key, room_key(namespace, room));
                        (old, key.clone())
                    })
                    .collect()
            }
        };

        for (old, new) in moved {
            self.inner.registry.leave(&old, self.id()).await;
            self.inner.registry.join(&new, self.member()).await;
        }
        true
    }

    /// Move to `Disconnected`. Returns `false` if already there.
    pub(crate) fn mark_disconnected(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.status == SocketState::Disconnected {
            return false;
        }
        state.status = SocketState::Disconnected;
        true
    }

    /// Drop pending acks and handlers, returning how many acks were pending
    pub(crate) fn clear_session(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.router = EventRouter::new();
        state.acks.clear()
    }

    /// Check if the application asked for the session to close
    pub(crate) fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Resolves once `disconnect` has been called
    pub(crate) async fn closed(&self) {
        self.inner.close_signal.notified().await;
    }

    pub(crate) async fn close_transport(&self) {
        self.inner.close_transport().await;
    }
}

impl PartialEq for Socket {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Socket {}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Socket")
            .field("id", &self.inner.id)
            .field("namespace", &state.namespace)
            .field("status", &state.status)
            .field("rooms", &state.rooms.len())
            .field("pending_acks", &state.acks.len())
            .finish()
    }
}
