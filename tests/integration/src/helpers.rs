//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers and making HTTP requests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Response};
use sio_common::AppConfig;
use sio_gateway::{create_app, serve, GatewayState, Server};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::client::SioClient;

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub server: Server,
    path: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a test server; `setup` registers handlers before it accepts
    pub async fn start(setup: impl FnOnce(&Server)) -> Result<Self> {
        Self::start_with_config(test_config(&[])?, setup).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig, setup: impl FnOnce(&Server)) -> Result<Self> {
        let server = Server::new(config.socketio.clone());
        setup(&server);

        let path = config.socketio.path.clone();
        let app = create_app(GatewayState::new(server.clone(), config));

        // Bind to an ephemeral port
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            serve(listener, app).await.ok();
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr,
            client,
            server,
            path,
            handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL of the Socket.IO endpoint
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, self.path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Open a Socket.IO connection and consume the server's CONNECT
    pub async fn connect(&self) -> Result<SioClient> {
        let mut client = SioClient::connect(&self.ws_url()).await?;
        let hello = client.recv().await?;
        anyhow::ensure!(
            hello.packet_type == sio_core::PacketType::Connect,
            "expected CONNECT, got {hello}"
        );
        Ok(client)
    }

    /// Wait until `check` holds or the timeout elapses
    pub async fn wait_for<F, Fut>(&self, check: F) -> Result<()>
    where
        F: Fn(Server) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check(self.server.clone()).await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| anyhow::anyhow!("condition not reached"))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Create a test configuration from defaults plus `overrides`
pub fn test_config(overrides: &[(&str, &str)]) -> Result<AppConfig> {
    let vars: HashMap<String, String> = overrides
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    AppConfig::from_lookup(|key| vars.get(key).cloned())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))
}
