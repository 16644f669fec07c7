//! Gateway error types

use sio_core::{ArgumentDecodeError, CodecError, HandlerError};
use thiserror::Error;

/// Failure of the underlying frame transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Reading the next frame failed
    #[error("Transport read failed: {0}")]
    Read(String),

    /// Writing a frame failed
    #[error("Transport write failed: {0}")]
    Write(String),

    /// The transport was already closed
    #[error("Transport closed")]
    Closed,
}

/// Session-level error
#[derive(Debug, Error)]
pub enum SocketError {
    /// An inbound frame could not be decoded
    #[error("Malformed packet: {0}")]
    MalformedPacket(#[source] CodecError),

    /// An outbound packet could not be encoded
    #[error("Failed to encode packet: {0}")]
    Encode(#[source] CodecError),

    /// Packet data did not match the handler's declared shapes
    #[error(transparent)]
    ArgumentDecode(#[from] ArgumentDecodeError),

    /// Application handler returned an error value
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session has already terminated
    #[error("Socket is closed")]
    Closed,
}

impl SocketError {
    /// Check if this error ends the session
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedPacket(_) | Self::Transport(_))
    }

    /// Short name for log output
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPacket(_) => "malformed_packet",
            Self::Encode(_) => "encode",
            Self::ArgumentDecode(_) => "argument_decode",
            Self::Handler(_) => "handler",
            Self::Transport(_) => "transport",
            Self::Closed => "closed",
        }
    }
}

/// Result type for socket operations
pub type SocketResult<T> = Result<T, SocketError>;
