//! Registry wrapper that stalls every `join`, used to widen race windows
//! in tests.

use super::{LocalRoomRegistry, Member, RoomRegistry};
use async_trait::async_trait;
use sio_core::Arg;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct DelayedRegistry {
    inner: LocalRoomRegistry,
    delay: Duration,
}

impl DelayedRegistry {
    pub(crate) fn new_shared(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalRoomRegistry::new(),
            delay,
        })
    }
}

#[async_trait]
impl RoomRegistry for DelayedRegistry {
    async fn join(&self, room: &str, member: Arc<dyn Member>) {
        tokio::time::sleep(self.delay).await;
        self.inner.join(room, member).await;
    }

    async fn leave(&self, room: &str, member_id: &str) {
        self.inner.leave(room, member_id).await;
    }

    async fn send(&self, ignore: Option<&str>, room: &str, event: &str, args: Vec<Arg>) {
        self.inner.send(ignore, room, event, args).await;
    }

    async fn member_count(&self, room: &str) -> usize {
        self.inner.member_count(room).await
    }

    async fn room_count(&self) -> usize {
        self.inner.room_count().await
    }

    async fn room_names(&self) -> Vec<String> {
        self.inner.room_names().await
    }
}
