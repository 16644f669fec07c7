//! Packet type codes
//!
//! The leading digit of every text frame.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Socket.IO packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Namespace connect (client/server)
    Connect = 0,
    /// Namespace disconnect (client/server)
    Disconnect = 1,
    /// Named event with JSON arguments
    Event = 2,
    /// Reply to an event that requested an ack
    Ack = 3,
    /// Protocol-level error
    Error = 4,
    /// Event carrying binary attachments
    BinaryEvent = 5,
    /// Ack carrying binary attachments
    BinaryAck = 6,
}

impl PacketType {
    /// Create a `PacketType` from a raw integer value
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Connect),
            1 => Some(Self::Disconnect),
            2 => Some(Self::Event),
            3 => Some(Self::Ack),
            4 => Some(Self::Error),
            5 => Some(Self::BinaryEvent),
            6 => Some(Self::BinaryAck),
            _ => None,
        }
    }

    /// Parse the ASCII type digit at the start of a frame
    #[must_use]
    pub fn from_digit(c: char) -> Option<Self> {
        c.to_digit(10).and_then(|d| Self::from_u8(d as u8))
    }

    /// Get the raw integer value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Packets that are followed by binary attachment frames
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::BinaryEvent | Self::BinaryAck)
    }

    /// `Event` or `BinaryEvent`
    #[must_use]
    pub const fn is_event(self) -> bool {
        matches!(self, Self::Event | Self::BinaryEvent)
    }

    /// `Ack` or `BinaryAck`
    #[must_use]
    pub const fn is_ack(self) -> bool {
        matches!(self, Self::Ack | Self::BinaryAck)
    }

    /// The binary variant of an event/ack type, or `self` for the rest
    #[must_use]
    pub const fn with_attachments(self) -> Self {
        match self {
            Self::Event => Self::BinaryEvent,
            Self::Ack => Self::BinaryAck,
            other => other,
        }
    }

    /// Get the name of this packet type
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Event => "EVENT",
            Self::Ack => "ACK",
            Self::Error => "ERROR",
            Self::BinaryEvent => "BINARY_EVENT",
            Self::BinaryAck => "BINARY_ACK",
        }
    }
}

impl Serialize for PacketType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for PacketType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid packet type: {value}")))
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}
