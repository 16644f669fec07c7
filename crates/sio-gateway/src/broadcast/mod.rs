//! Room broadcasting
//!
//! Tracks room membership across sessions and fans events out to members.

#[cfg(test)]
pub(crate) mod delayed;
mod registry;

pub use registry::{room_key, LocalRoomRegistry, Member, RoomRegistry};
