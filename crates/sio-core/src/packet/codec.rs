//! Packet codec
//!
//! Text frame grammar:
//!
//! ```text
//! <type>[<attachments>-][<namespace>,][<ack id>][<json>]
//! ```
//!
//! The attachment count is present only for BINARY_EVENT and BINARY_ACK,
//! whose text frame is followed by that many binary frames.

use super::{AckId, Packet, PacketType, DEFAULT_NAMESPACE};
use crate::args::placeholder_index;
use crate::error::CodecError;
use serde_json::Value;
use std::fmt::Write as _;

/// A single transport-level message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame carrying an encoded packet header and JSON payload
    Text(String),
    /// Raw binary attachment
    Binary(Vec<u8>),
}

impl Frame {
    /// Check if this is a binary frame
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

/// Encode a packet into its text frame followed by any binary attachments
pub fn encode(packet: &Packet) -> Result<Vec<Frame>, CodecError> {
    let ty = packet.packet_type;
    let mut text = String::with_capacity(32);

    text.push(char::from(b'0' + ty.as_u8()));

    if ty.is_binary() {
        let _ = write!(text, "{}-", packet.attachments.len());
    }

    if !packet.namespace.is_empty() && packet.namespace != DEFAULT_NAMESPACE {
        text.push_str(&packet.namespace);
        text.push(',');
    }

    if ty.is_event() || ty.is_ack() {
        if let Some(id) = packet.id {
            let _ = write!(text, "{id}");
        }
        let payload = serde_json::to_string(&packet.data).map_err(CodecError::Encode)?;
        text.push_str(&payload);
    } else {
        match packet.data.as_slice() {
            [] => {}
            [value] => {
                let payload = serde_json::to_string(value).map_err(CodecError::Encode)?;
                text.push_str(&payload);
            }
            _ => return Err(CodecError::TooManyValues(ty)),
        }
    }

    let mut frames = Vec::with_capacity(1 + packet.attachments.len());
    frames.push(Frame::Text(text));
    if ty.is_binary() {
        frames.extend(packet.attachments.iter().cloned().map(Frame::Binary));
    }
    Ok(frames)
}

/// Decode the text frame of a packet.
///
/// Returns the packet (without attachments) and the number of binary
/// frames that must follow it.
pub fn decode_text(text: &str) -> Result<(Packet, usize), CodecError> {
    let first = text.chars().next().ok_or(CodecError::EmptyFrame)?;
    let packet_type = PacketType::from_digit(first).ok_or(CodecError::UnknownType(first))?;
    // Type digits are ASCII, so the header is one byte wide.
    let mut rest = &text[1..];

    let attachments = if packet_type.is_binary() {
        let dash = rest.find('-').ok_or(CodecError::InvalidAttachmentCount)?;
        let count = rest[..dash]
            .parse::<usize>()
            .map_err(|_| CodecError::InvalidAttachmentCount)?;
        rest = &rest[dash + 1..];
        count
    } else {
        0
    };

    let namespace = if rest.starts_with('/') {
        match rest.find(',') {
            Some(comma) => {
                let nsp = &rest[..comma];
                rest = &rest[comma + 1..];
                nsp
            }
            None if rest.contains(&['[', '{', '"'][..]) => {
                return Err(CodecError::UnterminatedNamespace);
            }
            None => {
                let nsp = rest;
                rest = "";
                nsp
            }
        }
    } else {
        DEFAULT_NAMESPACE
    };

    let mut id = None;
    if packet_type.is_event() || packet_type.is_ack() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            let parsed = rest[..digits]
                .parse::<AckId>()
                .map_err(|_| CodecError::InvalidAckId)?;
            id = Some(parsed);
            rest = &rest[digits..];
        }
    }

    let payload = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest).map_err(CodecError::InvalidJson)?)
    };

    let data = shape_payload(packet_type, id, payload)?;

    let packet = Packet {
        packet_type,
        namespace: namespace.to_string(),
        id,
        data,
        attachments: Vec::new(),
    };

    Ok((packet, attachments))
}

fn shape_payload(
    packet_type: PacketType,
    id: Option<AckId>,
    payload: Option<Value>,
) -> Result<Vec<Value>, CodecError> {
    let invalid = |reason| CodecError::InvalidPayload {
        packet_type,
        reason,
    };

    if packet_type.is_event() {
        return match payload {
            Some(Value::Array(items)) if matches!(items.first(), Some(Value::String(_))) => {
                Ok(items)
            }
            Some(_) => Err(invalid("must be an array starting with the event name")),
            None => Err(invalid("is missing")),
        };
    }

    if packet_type.is_ack() {
        if id.is_none() {
            return Err(invalid("requires an ack id"));
        }
        return match payload {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(invalid("must be an array")),
            None => Ok(Vec::new()),
        };
    }

    Ok(payload.into_iter().collect())
}

fn max_placeholder(value: &Value) -> Option<usize> {
    if let Some(index) = placeholder_index(value) {
        return Some(index);
    }
    match value {
        Value::Array(items) => items.iter().filter_map(max_placeholder).max(),
        Value::Object(map) => map.values().filter_map(max_placeholder).max(),
        _ => None,
    }
}

#[derive(Debug)]
struct PendingPacket {
    packet: Packet,
    expected: usize,
}

/// Incremental decoder that reassembles binary packets from their text
/// frame and trailing attachment frames.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    pending: Option<PendingPacket>,
}

impl PacketDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame.
    ///
    /// Returns `Ok(Some(packet))` once a packet is complete and `Ok(None)`
    /// while attachments are still outstanding. Any error discards the
    /// partially assembled packet.
    pub fn feed(&mut self, frame: Frame) -> Result<Option<Packet>, CodecError> {
        match (frame, self.pending.take()) {
            (Frame::Text(_), Some(_)) => Err(CodecError::ExpectedAttachment),
            (Frame::Binary(_), None) => Err(CodecError::UnexpectedBinary),
            (Frame::Text(text), None) => {
                let (packet, expected) = decode_text(&text)?;
                self.complete_or_wait(PendingPacket { packet, expected })
            }
            (Frame::Binary(bytes), Some(mut pending)) => {
                pending.packet.attachments.push(bytes);
                self.complete_or_wait(pending)
            }
        }
    }

    fn complete_or_wait(&mut self, pending: PendingPacket) -> Result<Option<Packet>, CodecError> {
        if pending.packet.attachments.len() < pending.expected {
            self.pending = Some(pending);
            return Ok(None);
        }

        let packet = pending.packet;
        let referenced = packet.data.iter().filter_map(max_placeholder).max();
        if referenced.is_some_and(|index| index >= packet.attachments.len()) {
            return Err(CodecError::InvalidPayload {
                packet_type: packet.packet_type,
                reason: "references a missing attachment",
            });
        }
        Ok(Some(packet))
    }

    /// Check if a binary packet is waiting for attachments
    #[must_use]
    pub fn is_awaiting_attachments(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any partially assembled packet
    pub fn reset(&mut self) {
        self.pending = None;
    }
}
