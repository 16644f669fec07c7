//! Sessions
//!
//! The `Socket` handle applications talk to and the read loop that drives
//! it.

mod session;
mod socket;

pub(crate) use session::Session;
pub use session::{ErrorHandler, SessionOptions};
pub use socket::{Socket, SocketState};
