//! Pending acknowledgement table
//!
//! Each outbound emit that expects an answer is assigned an id from a
//! wrapping counter. The callback is stored until the peer's ACK arrives
//! and is consumed exactly once.

use super::handler::{Handler, Reply};
use crate::error::ArgumentDecodeError;
use crate::packet::AckId;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;

/// Per-session table of ack callbacks awaiting a reply
pub struct AckTable<C> {
    next_id: AckId,
    pending: HashMap<AckId, Handler<C>>,
}

impl<C> Default for AckTable<C> {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

impl<C> AckTable<C> {
    /// Create an empty table whose first id is 0
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table whose first id is `id`
    #[must_use]
    pub fn starting_at(id: AckId) -> Self {
        Self {
            next_id: id,
            pending: HashMap::new(),
        }
    }

    /// Store `callback` and return the id it was registered under.
    ///
    /// Ids increase by one and wrap to 0; an id still awaiting its reply
    /// is skipped.
    pub fn insert(&mut self, callback: Handler<C>) -> AckId {
        let mut id = self.next_id;
        while self.pending.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        self.next_id = id.wrapping_add(1);
        self.pending.insert(id, callback);
        id
    }

    /// Remove and return the callback for `id`
    pub fn take(&mut self, id: AckId) -> Option<Handler<C>> {
        self.pending.remove(&id)
    }

    /// Consume the callback for `id` and return the call to run.
    ///
    /// The returned future owns everything it needs, so a caller holding
    /// the table behind a lock can release it before awaiting. Returns
    /// `None` for an unknown id.
    pub fn resolve(
        &mut self,
        id: AckId,
        ctx: C,
        values: Vec<Value>,
        attachments: Vec<Vec<u8>>,
    ) -> Option<impl Future<Output = Result<Reply, ArgumentDecodeError>>>
    where
        C: Send + 'static,
    {
        let callback = self.pending.remove(&id)?;
        Some(async move { callback.call(ctx, &values, &attachments).await })
    }

    /// Check if `id` is awaiting a reply
    pub fn contains(&self, id: AckId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of outstanding callbacks
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every outstanding callback, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// The id the next insert will try first
    pub fn next_id(&self) -> AckId {
        self.next_id
    }
}

impl<C> std::fmt::Debug for AckTable<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckTable")
            .field("next_id", &self.next_id)
            .field("pending", &self.pending.len())
            .finish()
    }
}
