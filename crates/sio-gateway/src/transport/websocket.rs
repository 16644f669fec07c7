//! axum WebSocket adapter
//!
//! Text and binary messages map 1:1 to frames. Ping/pong is answered by
//! axum; a Close message ends the stream.

use super::{FrameReader, FrameWriter, RequestInfo, TransportConnection};
use crate::error::TransportError;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use sio_core::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Read half of an upgraded WebSocket
pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => return Ok(Some(Frame::Text(text))),
                Ok(Message::Binary(bytes)) => return Ok(Some(Frame::Binary(bytes))),
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Pong is handled automatically by axum
                }
                Ok(Message::Close(_)) => return Ok(None),
                Err(e) => return Err(TransportError::Read(e.to_string())),
            }
        }
        Ok(None)
    }
}

/// Write half of an upgraded WebSocket
pub struct WsWriter {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn write_frames(&self, frames: Vec<Frame>) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        for frame in frames {
            let message = match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Binary(bytes) => Message::Binary(bytes),
            };
            sink.feed(message)
                .await
                .map_err(|e| TransportError::Write(e.to_string()))?;
        }
        sink.flush()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        sink.close()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

/// Split an upgraded socket into a transport connection
pub fn connection(
    id: impl Into<String>,
    request: RequestInfo,
    socket: WebSocket,
) -> TransportConnection {
    let (sink, stream) = socket.split();
    let writer = WsWriter {
        sink: Mutex::new(sink),
        closed: AtomicBool::new(false),
    };
    TransportConnection::new(id, request, Box::new(WsReader { stream }), Arc::new(writer))
}
