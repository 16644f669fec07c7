//! Gateway server setup
//!
//! The Socket.IO server and the axum routes that feed it WebSocket
//! connections.

mod handler;
mod server;
mod state;

pub use handler::socketio_handler;
pub use server::Server;
pub use state::GatewayState;

use axum::{routing::get, Router};
use sio_common::{AppConfig, AppError};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router with the Socket.IO endpoint mounted at `path`
pub fn create_router(path: &str) -> Router<GatewayState> {
    Router::new()
        .route(path, get(socketio_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router(&state.config().socketio.path)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on an already bound listener
pub async fn serve(listener: TcpListener, app: Router) -> Result<(), AppError> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(AppError::Server)
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: &str) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::bind(addr, e))?;

    serve(listener, app).await
}

/// Run the gateway with `server` handling Socket.IO sessions
pub async fn run(config: AppConfig, server: Server) -> Result<(), AppError> {
    let addr = config.gateway.address();
    tracing::info!(
        path = %config.socketio.path,
        namespace = %config.socketio.namespace,
        "Socket.IO endpoint ready"
    );

    let app = create_app(GatewayState::new(server, config));
    run_server(app, &addr).await
}
