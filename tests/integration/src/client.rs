//! Minimal Socket.IO client over tokio-tungstenite

use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use sio_core::{encode, Frame, Packet, PacketDecoder};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Test client speaking raw Socket.IO packets
pub struct SioClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    decoder: PacketDecoder,
}

impl SioClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        Ok(Self {
            ws,
            decoder: PacketDecoder::new(),
        })
    }

    /// Send a raw text frame
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Encode and send a packet with its attachments
    pub async fn send(&mut self, packet: &Packet) -> Result<()> {
        for frame in encode(packet)? {
            let message = match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Binary(bytes) => Message::Binary(bytes),
            };
            self.ws.send(message).await?;
        }
        Ok(())
    }

    /// Receive the next packet, reassembling binary attachments
    pub async fn recv(&mut self) -> Result<Packet> {
        tokio::time::timeout(RECV_TIMEOUT, self.next_packet())
            .await
            .map_err(|_| anyhow!("timed out waiting for a packet"))?
    }

    /// True once the server has closed the connection
    pub async fn is_closed(&mut self) -> bool {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.ws.next()).await {
                Ok(None | Some(Err(_) | Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
                Err(_) => return false,
            }
        }
    }

    async fn next_packet(&mut self) -> Result<Packet> {
        loop {
            let frame = match self.ws.next().await {
                Some(Ok(Message::Text(text))) => Frame::Text(text),
                Some(Ok(Message::Binary(bytes))) => Frame::Binary(bytes),
                Some(Ok(Message::Close(_))) | None => return Err(anyhow!("connection closed")),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            };
            if let Some(packet) = self.decoder.feed(frame)? {
                return Ok(packet);
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
