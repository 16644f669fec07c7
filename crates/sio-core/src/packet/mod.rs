//! Wire packets
//!
//! Packet types, the packet model, the frame codec and the message reader.

mod codec;
mod message_reader;
mod packet;
mod packet_type;

pub use codec::{decode_text, encode, Frame, PacketDecoder};
pub use message_reader::{EventMessage, CONNECTION_EVENT, DISCONNECT_EVENT, ERROR_EVENT};
pub use packet::{AckId, Packet, DEFAULT_NAMESPACE};
pub use packet_type::PacketType;
