//! # sio-gateway
//!
//! Socket.IO sessions over WebSocket: the per-connection read loop, the
//! socket handle exposed to handlers, room broadcasting and the axum
//! server that accepts connections.

pub mod broadcast;
pub mod error;
pub mod server;
pub mod socket;
pub mod transport;

pub use broadcast::{room_key, LocalRoomRegistry, Member, RoomRegistry};
pub use error::{SocketError, SocketResult, TransportError};
pub use server::{create_app, create_router, run, run_server, serve, GatewayState, Server};
pub use socket::{ErrorHandler, SessionOptions, Socket, SocketState};
pub use transport::{FrameReader, FrameWriter, RequestInfo, TransportConnection};
