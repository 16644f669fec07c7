//! Packet model
//!
//! A `Packet` is one logical protocol message before framing. Binary
//! arguments are already split out: `data` holds placeholder objects and
//! `attachments` holds the raw bytes in reference order.

use super::PacketType;
use crate::args::{encode_args, Arg};
use serde_json::Value;

/// Namespace used when a frame carries none
pub const DEFAULT_NAMESPACE: &str = "/";

/// Acknowledgement id carried by events that request a reply
pub type AckId = u64;

/// One protocol packet
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Packet type
    pub packet_type: PacketType,

    /// Namespace (`/` when the frame omits it)
    pub namespace: String,

    /// Ack id; `None` means no reply requested
    pub id: Option<AckId>,

    /// Payload values. For events the first element is the event name.
    pub data: Vec<Value>,

    /// Binary attachments referenced by placeholders in `data`
    pub attachments: Vec<Vec<u8>>,
}

impl Packet {
    fn bare(packet_type: PacketType, namespace: impl Into<String>) -> Self {
        Self {
            packet_type,
            namespace: namespace.into(),
            id: None,
            data: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Create a CONNECT packet
    #[must_use]
    pub fn connect(namespace: impl Into<String>) -> Self {
        Self::bare(PacketType::Connect, namespace)
    }

    /// Create a DISCONNECT packet
    #[must_use]
    pub fn disconnect(namespace: impl Into<String>) -> Self {
        Self::bare(PacketType::Disconnect, namespace)
    }

    /// Create an ERROR packet carrying a single payload value
    #[must_use]
    pub fn error(namespace: impl Into<String>, payload: Value) -> Self {
        let mut packet = Self::bare(PacketType::Error, namespace);
        packet.data.push(payload);
        packet
    }

    /// Create an EVENT packet, switching to BINARY_EVENT when any argument
    /// carries raw bytes.
    #[must_use]
    pub fn event(
        namespace: impl Into<String>,
        event: impl Into<String>,
        args: Vec<Arg>,
        id: Option<AckId>,
    ) -> Self {
        let (values, attachments) = encode_args(args);

        let mut data = Vec::with_capacity(values.len() + 1);
        data.push(Value::String(event.into()));
        data.extend(values);

        Self::with_payload(PacketType::Event, namespace, id, data, attachments)
    }

    /// Create an ACK packet replying to `id`
    #[must_use]
    pub fn ack(namespace: impl Into<String>, id: AckId, args: Vec<Arg>) -> Self {
        let (data, attachments) = encode_args(args);
        Self::with_payload(PacketType::Ack, namespace, Some(id), data, attachments)
    }

    fn with_payload(
        packet_type: PacketType,
        namespace: impl Into<String>,
        id: Option<AckId>,
        data: Vec<Value>,
        attachments: Vec<Vec<u8>>,
    ) -> Self {
        let packet_type = if attachments.is_empty() {
            packet_type
        } else {
            packet_type.with_attachments()
        };

        Self {
            packet_type,
            namespace: namespace.into(),
            id,
            data,
            attachments,
        }
    }

    /// Check if this packet's namespace is the default one
    #[must_use]
    pub fn is_default_namespace(&self) -> bool {
        self.namespace.is_empty() || self.namespace == DEFAULT_NAMESPACE
    }

    /// The embedded event name of an EVENT/BINARY_EVENT packet
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        if !self.packet_type.is_event() {
            return None;
        }
        self.data.first().and_then(Value::as_str)
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Packet({}, nsp={}", self.packet_type, self.namespace)?;
        if let Some(id) = self.id {
            write!(f, ", id={id}")?;
        }
        if let Some(name) = self.event_name() {
            write!(f, ", event={name}")?;
        }
        if !self.attachments.is_empty() {
            write!(f, ", attachments={}", self.attachments.len())?;
        }
        write!(f, ")")
    }
}
