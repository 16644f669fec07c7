//! Event routing
//!
//! Handler descriptors, the name-to-handler table and the pending ack
//! table.

mod ack;
mod handler;
mod table;

pub use ack::AckTable;
pub use handler::{AnyHandler, Handler, HandlerError, Reply};
pub use table::{Dispatch, EventRouter, Route};
