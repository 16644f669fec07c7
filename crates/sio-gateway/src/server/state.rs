//! Gateway state
//!
//! Application state shared by the axum routes.

use super::Server;
use sio_common::AppConfig;
use std::sync::Arc;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    /// Socket.IO server every upgraded connection is handed to
    server: Server,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(server: Server, config: AppConfig) -> Self {
        Self {
            server,
            config: Arc::new(config),
        }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("server", &self.server)
            .field("config", &"AppConfig")
            .finish()
    }
}
