//! Room registry
//!
//! Maps a room key to the sessions in it. Members are held weakly: the
//! registry never keeps a session alive, and a terminating session removes
//! itself from every room it joined.
//!
//! Delivery never runs under the registry lock. `send` snapshots the member
//! list, releases the lock, then delivers to every member concurrently, so
//! a handler that joins, leaves or broadcasts from inside a delivery cannot
//! deadlock.

use crate::error::SocketError;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use sio_core::Arg;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Registry key for `room` inside `namespace`.
///
/// A namespace is terminated by `,` on the wire and never contains one, so
/// splitting at the first comma recovers both parts.
#[must_use]
pub fn room_key(namespace: &str, room: &str) -> String {
    format!("{namespace},{room}")
}

/// Something that can be placed in a room and receive events
#[async_trait]
pub trait Member: Send + Sync {
    /// Stable member id
    fn member_id(&self) -> &str;

    /// Deliver an event to this member
    async fn deliver(&self, event: &str, args: Vec<Arg>) -> Result<(), SocketError>;
}

/// Room membership and fan-out.
///
/// Operations never fail: unknown rooms or members are no-ops. An
/// implementation may fan out across processes; `LocalRoomRegistry` keeps
/// everything in memory.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Add `member` to `room`, creating the room if needed. Idempotent.
    async fn join(&self, room: &str, member: Arc<dyn Member>);

    /// Remove `member_id` from `room`, deleting the room once empty
    async fn leave(&self, room: &str, member_id: &str);

    /// Deliver an event to every member of `room` except `ignore`.
    /// Individual delivery failures are not reported.
    async fn send(&self, ignore: Option<&str>, room: &str, event: &str, args: Vec<Arg>);

    /// Number of members in `room`
    async fn member_count(&self, room: &str) -> usize;

    /// Number of non-empty rooms
    async fn room_count(&self) -> usize;

    /// Keys of all non-empty rooms
    async fn room_names(&self) -> Vec<String>;
}

type Members = HashMap<String, Weak<dyn Member>>;

/// In-process room registry
#[derive(Default)]
pub struct LocalRoomRegistry {
    rooms: RwLock<HashMap<String, Members>>,
}

impl LocalRoomRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Live members of `room` except `ignore`
    fn snapshot(&self, room: &str, ignore: Option<&str>) -> Vec<Arc<dyn Member>> {
        let rooms = self.rooms.read();
        rooms
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter(|(id, _)| Some(id.as_str()) != ignore)
                    .filter_map(|(_, member)| member.upgrade())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoomRegistry for LocalRoomRegistry {
    async fn join(&self, room: &str, member: Arc<dyn Member>) {
        let member_id = member.member_id().to_string();
        self.rooms
            .write()
            .entry(room.to_string())
            .or_default()
            .insert(member_id.clone(), Arc::downgrade(&member));

        tracing::trace!(room = %room, member_id = %member_id, "Joined room");
    }

    async fn leave(&self, room: &str, member_id: &str) {
        let mut rooms = self.rooms.write();
        let Some(members) = rooms.get_mut(room) else {
            return;
        };
        members.remove(member_id);
        if members.is_empty() {
            rooms.remove(room);
            tracing::trace!(room = %room, "Room removed");
        }
    }

    async fn send(&self, ignore: Option<&str>, room: &str, event: &str, args: Vec<Arg>) {
        let members = self.snapshot(room, ignore);
        if members.is_empty() {
            return;
        }

        let deliveries = members
            .iter()
            .map(|member| member.deliver(event, args.clone()));
        let results = join_all(deliveries).await;

        for (member, result) in members.iter().zip(results) {
            if let Err(e) = result {
                tracing::debug!(
                    room = %room,
                    member_id = %member.member_id(),
                    event = %event,
                    error = %e,
                    "Broadcast delivery failed"
                );
            }
        }
    }

    async fn member_count(&self, room: &str) -> usize {
        self.rooms.read().get(room).map_or(0, HashMap::len)
    }

    async fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    async fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for LocalRoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRoomRegistry")
            .field("rooms", &self.rooms.read().len())
            .finish()
    }
}
