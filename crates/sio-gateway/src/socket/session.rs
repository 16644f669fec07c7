//! Session read loop
//!
//! One task per connection. Inbound packets are decoded and dispatched
//! strictly in order; a handler finishes before the next frame is read.
//!
//! Lifecycle:
//! 1. Send CONNECT, then dispatch a local CONNECT so the `"connection"`
//!    handler can register handlers and join rooms before any peer packet.
//! 2. Read, decode, dispatch until DISCONNECT, end of stream, a local
//!    `disconnect()`, or a fatal error.
//! 3. Terminate once: leave every room, dispatch a local DISCONNECT, drop
//!    pending acks and handlers, close the transport.

use super::Socket;
use crate::error::{SocketError, SocketResult};
use crate::transport::FrameReader;
use serde_json::json;
use sio_core::{Dispatch, EventMessage, Packet, PacketDecoder, PacketType};
use std::sync::Arc;

/// Server-wide error observer
pub type ErrorHandler = Arc<dyn Fn(Socket, SocketError) + Send + Sync>;

/// Per-session protocol options
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Send an ACK for a requested id even when the handler returned nothing
    pub ack_empty_results: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ack_empty_results: true,
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Drives one socket from accept to termination
pub(crate) struct Session {
    socket: Socket,
    reader: Box<dyn FrameReader>,
    decoder: PacketDecoder,
    options: SessionOptions,
    on_error: Option<ErrorHandler>,
}

impl Session {
    pub(crate) fn new(
        socket: Socket,
        reader: Box<dyn FrameReader>,
        options: SessionOptions,
        on_error: Option<ErrorHandler>,
    ) -> Self {
        Self {
            socket,
            reader,
            decoder: PacketDecoder::new(),
            options,
            on_error,
        }
    }

    /// Run the session to completion
    pub(crate) async fn run(mut self) {
        tracing::info!(session_id = %self.socket.id(), "Session accepted");

        let failure = match self.accept().await {
            Ok(()) => self.read_loop().await,
            Err(e) => Some(e),
        };

        if let Some(error) = failure {
            if self.socket.is_closing() {
                tracing::debug!(
                    session_id = %self.socket.id(),
                    error = %error,
                    "Error after local disconnect"
                );
            } else {
                tracing::warn!(
                    session_id = %self.socket.id(),
                    kind = error.kind(),
                    error = %error,
                    "Session failed"
                );
                self.report(error);
            }
        }

        self.terminate().await;
    }

    async fn accept(&mut self) -> SocketResult<()> {
        let namespace = self.socket.namespace();
        self.socket
            .send_packet(&Packet::connect(namespace.clone()))
            .await?;
        self.dispatch_local(Packet::connect(namespace)).await;
        Ok(())
    }

    /// Returns the fatal error that ended the loop, if any
    async fn read_loop(&mut self) -> Option<SocketError> {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.socket.closed() => {
                    tracing::debug!(session_id = %self.socket.id(), "Closed locally");
                    return None;
                }
                frame = self.reader.read_frame() => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!(session_id = %self.socket.id(), "Transport closed by peer");
                    return None;
                }
                Err(e) => return Some(e.into()),
            };

            let packet = match self.decoder.feed(frame) {
                Ok(Some(packet)) => packet,
                Ok(None) => continue,
                Err(e) => return Some(SocketError::MalformedPacket(e)),
            };

            tracing::trace!(session_id = %self.socket.id(), packet = %packet, "Received packet");

            match self.handle_packet(packet).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return None,
                Err(e) => return Some(e),
            }
        }
    }

    async fn handle_packet(&mut self, packet: Packet) -> SocketResult<Flow> {
        match packet.packet_type {
            PacketType::Connect => self.on_connect(packet.namespace).await?,
            PacketType::Disconnect => {
                tracing::debug!(session_id = %self.socket.id(), "Peer sent DISCONNECT");
                return Ok(Flow::Stop);
            }
            PacketType::Event | PacketType::BinaryEvent => self.on_event(packet).await?,
            PacketType::Ack | PacketType::BinaryAck => self.on_ack(packet).await,
            PacketType::Error => self.dispatch_local(packet).await,
        }
        Ok(Flow::Continue)
    }

    async fn on_connect(&mut self, namespace: String) -> SocketResult<()> {
        if self.socket.establish(&namespace).await {
            tracing::debug!(
                session_id = %self.socket.id(),
                namespace = %namespace,
                "Namespace connected"
            );
            return self.socket.send_packet(&Packet::connect(namespace)).await;
        }

        tracing::warn!(
            session_id = %self.socket.id(),
            namespace = %namespace,
            current = %self.socket.namespace(),
            "Rejected CONNECT for a second namespace"
        );
        self.socket
            .send_packet(&Packet::error(namespace, json!({ "message": "Invalid namespace" })))
            .await
    }

    async fn on_event(&mut self, packet: Packet) -> SocketResult<()> {
        let message = EventMessage::read(packet).map_err(SocketError::MalformedPacket)?;
        let ack_id = message.ack_id();
        let event = message.name().to_string();

        let route = self.socket.route(&event);
        match route.dispatch(self.socket.clone(), message).await {
            Ok(Dispatch::Handled(reply)) => {
                if let Some(error) = &reply.error {
                    tracing::debug!(
                        session_id = %self.socket.id(),
                        event = %event,
                        error = %error,
                        "Handler returned an error"
                    );
                    self.report(error.clone().into());
                }
                // Acks answer on the session's namespace, whatever the packet named
                if let Some(id) = ack_id {
                    if self.options.ack_empty_results || !reply.is_empty() {
                        let ack = Packet::ack(self.socket.namespace(), id, reply.into_ack_args());
                        self.socket.send_packet(&ack).await?;
                    }
                }
            }
            Ok(Dispatch::Unrouted) => {
                tracing::debug!(
                    session_id = %self.socket.id(),
                    event = %event,
                    "No handler registered"
                );
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.socket.id(),
                    event = %event,
                    error = %e,
                    "Argument decode failed"
                );
                self.report(e.into());
            }
        }
        Ok(())
    }

    async fn on_ack(&mut self, packet: Packet) {
        let Some(id) = packet.id else {
            return;
        };

        let Some(callback) = self.socket.take_ack(id, packet.data, packet.attachments) else {
            tracing::trace!(
                session_id = %self.socket.id(),
                ack_id = id,
                "Ignoring ack with unknown id"
            );
            return;
        };

        match callback.await {
            Ok(reply) => {
                if let Some(error) = reply.error {
                    self.report(error.into());
                }
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.socket.id(),
                    ack_id = id,
                    error = %e,
                    "Ack argument decode failed"
                );
                self.report(e.into());
            }
        }
    }

    /// Dispatch a packet that bypasses the ack path: synthetic CONNECT and
    /// DISCONNECT, and ERROR packets from the peer
    async fn dispatch_local(&mut self, packet: Packet) {
        let message = match EventMessage::read(packet) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    session_id = %self.socket.id(),
                    error = %e,
                    "Packet is not routable"
                );
                return;
            }
        };

        let route = self.socket.route(message.name());
        match route.dispatch(self.socket.clone(), message).await {
            Ok(Dispatch::Handled(reply)) => {
                if let Some(error) = reply.error {
                    self.report(error.into());
                }
            }
            Ok(Dispatch::Unrouted) => {}
            Err(e) => self.report(e.into()),
        }
    }

    async fn terminate(&mut self) {
        if !self.socket.mark_disconnected() {
            return;
        }

        self.decoder.reset();
        self.socket.leave_all().await;
        self.dispatch_local(Packet::disconnect(self.socket.namespace()))
            .await;
        let dropped = self.socket.clear_session();
        self.socket.close_transport().await;

        tracing::info!(
            session_id = %self.socket.id(),
            dropped_acks = dropped,
            "Session closed"
        );
    }

    fn report(&self, error: SocketError) {
        if let Some(on_error) = &self.on_error {
            on_error(self.socket.clone(), error);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("socket", &self.socket)
            .field("options", &self.options)
            .field("awaiting_attachments", &self.decoder.is_awaiting_attachments())
            .finish()
    }
}
