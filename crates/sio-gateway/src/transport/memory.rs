//! In-memory transport
//!
//! `pair()` returns a server-side connection and the peer that drives it.
//! Frames travel over unbounded channels, so writes never block.

use super::{FrameReader, FrameWriter, RequestInfo, TransportConnection};
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sio_core::{encode, CodecError, Frame, Packet, PacketDecoder};
use std::sync::Arc;
use tokio::sync::mpsc;

struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        Ok(self.inbound.recv().await)
    }
}

struct MemoryWriter {
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write_frames(&self, frames: Vec<Frame>) -> Result<(), TransportError> {
        let guard = self.outbound.lock();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        for frame in frames {
            tx.send(frame)
                .map_err(|_| TransportError::Write("peer dropped".to_string()))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.outbound.lock().take();
        Ok(())
    }
}

/// The client end of an in-memory connection
pub struct MemoryPeer {
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    inbound: mpsc::UnboundedReceiver<Frame>,
    decoder: PacketDecoder,
}

impl MemoryPeer {
    /// Send a raw frame to the server
    pub fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(frame)
            .map_err(|_| TransportError::Write("server dropped".to_string()))
    }

    /// Send a raw text frame
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send_frame(Frame::Text(text.into()))
    }

    /// Encode and send a packet
    pub fn send_packet(&self, packet: &Packet) -> Result<(), TransportError> {
        let frames = encode(packet).map_err(|e| TransportError::Write(e.to_string()))?;
        frames.into_iter().try_for_each(|frame| self.send_frame(frame))
    }

    /// Receive the next raw frame; `None` once the server closed
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    /// Receive and reassemble the next packet; `None` once the server closed
    pub async fn recv_packet(&mut self) -> Option<Result<Packet, CodecError>> {
        loop {
            let frame = self.inbound.recv().await?;
            match self.decoder.feed(frame) {
                Ok(Some(packet)) => return Some(Ok(packet)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Take a frame if one is already queued
    pub fn try_recv_frame(&mut self) -> Option<Frame> {
        self.inbound.try_recv().ok()
    }

    /// Close the client side; the server sees end of stream
    pub fn close(&mut self) {
        self.outbound = None;
    }
}

/// Create a connected in-memory transport
pub fn pair(id: impl Into<String>) -> (TransportConnection, MemoryPeer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let connection = TransportConnection::new(
        id,
        RequestInfo::local(),
        Box::new(MemoryReader { inbound: server_rx }),
        Arc::new(MemoryWriter {
            outbound: Mutex::new(Some(server_tx)),
        }),
    );
    let peer = MemoryPeer {
        outbound: Some(client_tx),
        inbound: client_rx,
        decoder: PacketDecoder::new(),
    };
    (connection, peer)
}
