//! # sio-core
//!
//! Protocol layer: packet types, the text/binary frame codec, argument
//! shapes, event routing and pending acknowledgements.
//! This crate has no dependency on a transport or async runtime.

pub mod args;
pub mod error;
pub mod packet;
pub mod router;

// Re-export commonly used types at crate root
pub use args::{decode_args, encode_args, Arg, ArgShape};
pub use error::{ArgumentDecodeError, CodecError};
pub use packet::{
    decode_text, encode, AckId, EventMessage, Frame, Packet, PacketDecoder, PacketType,
    CONNECTION_EVENT, DEFAULT_NAMESPACE, DISCONNECT_EVENT, ERROR_EVENT,
};
pub use router::{AckTable, AnyHandler, Dispatch, EventRouter, Handler, HandlerError, Reply, Route};
