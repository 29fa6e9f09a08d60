//! Configuration module - environment variable parsing and game settings

pub mod settings;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub use settings::{BorderSettings, GameSettings, SafeTeleportSettings};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HS256 secret shared with the world bridge and operators
    pub auth_jwt_secret: String,
    /// Allowed admin console origins for CORS (comma-separated)
    pub client_origin: String,

    /// Game settings document
    pub settings_path: PathBuf,
    /// Persisted arena document
    pub arena_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let auth_jwt_secret =
            env::var("AUTH_JWT_SECRET").map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?;
        if auth_jwt_secret.trim().is_empty() {
            return Err(ConfigError::Missing("AUTH_JWT_SECRET"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            auth_jwt_secret,
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            settings_path: env::var("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("settings.json")),
            arena_path: env::var("ARENA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("arenas.json")),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
