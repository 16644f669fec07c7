//! Protocol errors - codec and argument decoding failures

use thiserror::Error;

use crate::args::ArgShape;
use crate::packet::PacketType;

/// Errors raised while framing or unframing packets.
///
/// Every variant except `Encode` is a `MalformedPacket` condition and is
/// fatal to the connection that produced it.
#[derive(Debug, Error)]
pub enum CodecError {
    // =========================================================================
    // Malformed frames
    // =========================================================================
    #[error("Malformed packet: empty frame")]
    EmptyFrame,

    #[error("Malformed packet: unknown packet type {0:?}")]
    UnknownType(char),

    #[error("Malformed packet: invalid attachment count")]
    InvalidAttachmentCount,

    #[error("Malformed packet: invalid ack id")]
    InvalidAckId,

    #[error("Malformed packet: unterminated namespace")]
    UnterminatedNamespace,

    #[error("Malformed packet: invalid JSON payload: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Malformed packet: {packet_type} payload {reason}")]
    InvalidPayload {
        packet_type: PacketType,
        reason: &'static str,
    },

    #[error("Malformed packet: expected binary attachment, got text frame")]
    ExpectedAttachment,

    #[error("Malformed packet: unexpected binary frame")]
    UnexpectedBinary,

    // =========================================================================
    // Encoding
    // =========================================================================
    #[error("Failed to encode packet: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to encode packet: {0} carries at most one payload value")]
    TooManyValues(PacketType),
}

impl CodecError {
    /// Check if this error describes an unparseable inbound frame
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Encode(_) | Self::TooManyValues(_))
    }
}

/// An inbound argument did not match the shape its handler declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Argument {position} expected {expected}, found {found}")]
pub struct ArgumentDecodeError {
    /// Zero-based argument position (event name excluded)
    pub position: usize,
    /// Declared shape
    pub expected: ArgShape,
    /// JSON kind actually received
    pub found: &'static str,
}
