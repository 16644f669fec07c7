//! Application configuration structs
//!
//! Loads configuration from environment variables, with a `.env` file
//! read first when present.

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub socketio: SocketIoConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            _ => Err(()),
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Protocol behaviour settings
#[derive(Debug, Clone, Deserialize)]
pub struct SocketIoConfig {
    /// HTTP path the WebSocket upgrade is served on
    #[serde(default = "default_path")]
    pub path: String,
    /// Namespace used by server-level broadcasts
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Send an ACK for a requested id even when the handler returned nothing
    #[serde(default = "default_ack_empty_results")]
    pub ack_empty_results: bool,
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            namespace: default_namespace(),
            ack_empty_results: default_ack_empty_results(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "socketio-server".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_path() -> String {
    "/socket.io/".to_string()
}

fn default_namespace() -> String {
    "/".to_string()
}

fn default_ack_empty_results() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: parse_var(&lookup, "APP_ENV", Environment::default)?,
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parse_var(&lookup, "GATEWAY_PORT", default_port)?,
            },
            socketio: SocketIoConfig {
                path: rooted(&lookup, "SOCKETIO_PATH", default_path)?,
                namespace: namespace(&lookup, "SOCKETIO_NAMESPACE", default_namespace)?,
                ack_empty_results: flag(
                    &lookup,
                    "SOCKETIO_ACK_EMPTY_RESULTS",
                    default_ack_empty_results,
                )?,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidVar(key, raw)),
        None => Ok(default()),
    }
}

/// A path-like value that must start with `/`
fn rooted<F>(lookup: &F, key: &'static str, default: fn() -> String) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if raw.starts_with('/') => Ok(raw),
        Some(raw) => Err(ConfigError::InvalidVar(key, raw)),
        None => Ok(default()),
    }
}

/// A namespace: rooted, and free of the `,` that ends it on the wire
fn namespace<F>(
    lookup: &F,
    key: &'static str,
    default: fn() -> String,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = rooted(lookup, key, default)?;
    if value.contains(',') {
        return Err(ConfigError::InvalidVar(key, value));
    }
    Ok(value)
}

fn flag<F>(lookup: &F, key: &'static str, default: fn() -> bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default());
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidVar(key, raw)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}
