//! Message reader
//!
//! Splits the routable name off a decoded packet and keeps the remaining
//! arguments in their wire form until the target handler's declared shapes
//! are known.

use super::{AckId, Packet, PacketType};
use crate::args::{decode_args, Arg, ArgShape};
use crate::error::{ArgumentDecodeError, CodecError};
use serde_json::Value;

/// Event name dispatched for CONNECT packets
pub const CONNECTION_EVENT: &str = "connection";

/// Event name dispatched for DISCONNECT packets
pub const DISCONNECT_EVENT: &str = "disconnect";

/// Event name dispatched for ERROR packets
pub const ERROR_EVENT: &str = "error";

/// A packet resolved to an event name plus undecoded arguments
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    name: String,
    packet_type: PacketType,
    namespace: String,
    id: Option<AckId>,
    args: Vec<Value>,
    attachments: Vec<Vec<u8>>,
}

impl EventMessage {
    /// Resolve the event name of a packet.
    ///
    /// CONNECT maps to `"connection"`, DISCONNECT to `"disconnect"`, ERROR
    /// to `"error"` and events to their embedded name. ACK packets are not
    /// routable by name.
    pub fn read(packet: Packet) -> Result<Self, CodecError> {
        let Packet {
            packet_type,
            namespace,
            id,
            data,
            attachments,
        } = packet;

        let (name, args) = match packet_type {
            PacketType::Connect => (CONNECTION_EVENT.to_string(), data),
            PacketType::Disconnect => (DISCONNECT_EVENT.to_string(), data),
            PacketType::Error => (ERROR_EVENT.to_string(), data),
            PacketType::Event | PacketType::BinaryEvent => {
                let mut data = data.into_iter();
                let name = match data.next() {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(CodecError::InvalidPayload {
                            packet_type,
                            reason: "must be an array starting with the event name",
                        })
                    }
                };
                (name, data.collect())
            }
            PacketType::Ack | PacketType::BinaryAck => {
                return Err(CodecError::InvalidPayload {
                    packet_type,
                    reason: "is not routable by event name",
                })
            }
        };

        Ok(Self {
            name,
            packet_type,
            namespace,
            id,
            args,
            attachments,
        })
    }

    /// Get the resolved event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the type of the packet this message was read from
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Get the namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the requested ack id, if any
    pub fn ack_id(&self) -> Option<AckId> {
        self.id
    }

    /// Check if this message came from an EVENT/BINARY_EVENT packet
    pub fn is_event(&self) -> bool {
        self.packet_type.is_event()
    }

    /// Number of arguments after the event name
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Raw arguments after the event name
    pub fn raw_args(&self) -> &[Value] {
        &self.args
    }

    /// Decode the arguments against a handler's declared shapes
    pub fn decode_args(&self, shapes: &[ArgShape]) -> Result<Vec<Arg>, ArgumentDecodeError> {
        decode_args(&self.args, &self.attachments, shapes)
    }

    /// Decode every argument without a declared shape
    pub fn decode_all(&self) -> Vec<Arg> {
        self.args
            .iter()
            .cloned()
            .map(|value| Arg::from_value(value, &self.attachments))
            .collect()
    }
}
