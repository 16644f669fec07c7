//! Frame transports
//!
//! A session only needs three capabilities from its connection: read the
//! next frame, write frames, close. Adapters exist for axum WebSockets and
//! for an in-memory pipe used by tests.

pub mod memory;
pub mod websocket;

use crate::error::TransportError;
use async_trait::async_trait;
use axum::http::{HeaderMap, Uri};
use chrono::{DateTime, Utc};
use sio_core::Frame;
use std::net::SocketAddr;
use std::sync::Arc;

/// Read half of a connection
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next frame. `Ok(None)` means the peer closed the stream.
    async fn read_frame(&mut self) -> Result<Option<Frame>, TransportError>;
}

/// Write half of a connection, shared by every task that emits to the
/// session.
#[async_trait]
pub trait FrameWriter: Send + Sync {
    /// Write `frames` back to back; no other writer's frames are
    /// interleaved with them.
    async fn write_frames(&self, frames: Vec<Frame>) -> Result<(), TransportError>;

    /// Close the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<(), TransportError>;

    /// Write a single frame
    async fn write_frame(&self, frame: Frame) -> Result<(), TransportError> {
        self.write_frames(vec![frame]).await
    }
}

/// Metadata about the request that opened the connection
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
}

impl RequestInfo {
    /// Capture request metadata, stamped with the current time
    #[must_use]
    pub fn new(uri: Uri, headers: HeaderMap, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            uri,
            headers,
            remote_addr,
            connected_at: Utc::now(),
        }
    }

    /// Metadata for a connection that did not come from an HTTP request
    #[must_use]
    pub fn local() -> Self {
        Self::new(Uri::from_static("/"), HeaderMap::new(), None)
    }

    /// Get a request header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a query string parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }
}

/// An accepted connection, ready to be served
pub struct TransportConnection {
    /// Stable connection id, used as the session id
    pub id: String,
    pub request: RequestInfo,
    pub reader: Box<dyn FrameReader>,
    pub writer: Arc<dyn FrameWriter>,
}

impl TransportConnection {
    pub fn new(
        id: impl Into<String>,
        request: RequestInfo,
        reader: Box<dyn FrameReader>,
        writer: Arc<dyn FrameWriter>,
    ) -> Self {
        Self {
            id: id.into(),
            request,
            reader,
            writer,
        }
    }
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("id", &self.id)
            .field("uri", &self.request.uri)
            .field("remote_addr", &self.request.remote_addr)
            .finish()
    }
}
