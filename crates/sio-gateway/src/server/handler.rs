//! WebSocket handler
//!
//! Upgrades the request and hands the connection to the Socket.IO server.

use crate::server::GatewayState;
use crate::transport::{websocket, RequestInfo};
use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::{HeaderMap, Uri},
    response::IntoResponse,
};
use std::net::SocketAddr;
use uuid::Uuid;

/// Socket.IO endpoint
pub async fn socketio_handler(
    State(state): State<GatewayState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let request = RequestInfo::new(uri, headers, connect_info.map(|ConnectInfo(addr)| addr));

    ws.on_upgrade(move |socket| async move {
        let session_id = Uuid::new_v4().to_string();
        tracing::debug!(
            session_id = %session_id,
            remote_addr = ?request.remote_addr,
            "WebSocket upgraded"
        );

        let connection = websocket::connection(session_id, request, socket);
        state.server().serve(connection).await;
    })
}
