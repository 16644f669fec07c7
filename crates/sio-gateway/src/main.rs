//! Socket.IO Gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p sio-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use sio_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use sio_core::Handler;
use sio_gateway::{Server, Socket};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Run the server
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        eprintln!("Gateway failed to start: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        name = %config.app.name,
        env = ?config.app.env,
        port = config.gateway.port,
        "Configuration loaded"
    );

    let server = Server::new(config.socketio.clone());
    server.on_connection(Handler::new(&[], |socket: Socket, _args| async move {
        info!(
            session_id = %socket.id(),
            namespace = %socket.namespace(),
            remote_addr = ?socket.request().remote_addr,
            "Client connected"
        );
    }));
    server.on("disconnect", Handler::new(&[], |socket: Socket, _args| async move {
        info!(session_id = %socket.id(), "Client disconnected");
    }));
    server.on_error(|socket, error| {
        warn!(session_id = %socket.id(), kind = error.kind(), error = %error, "Socket error");
    });

    sio_gateway::run(config, server).await?;

    Ok(())
}
