//! Environment-driven server configuration

use std::env;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub log_level: String,
    pub auth_verify_url: String,
    pub auth_api_key: String,
    pub store_url: String,
    pub store_api_key: String,
    pub client_origin: String,
}

impl Config {
    /// Load configuration from the environment. `.env` files are honored in
    /// development; missing required variables fail startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let server_addr = env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("SERVER_ADDR".into(), format!("{e}")))?;

        Ok(Self {
            server_addr,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            auth_verify_url: require("AUTH_VERIFY_URL")?,
            auth_api_key: require("AUTH_API_KEY")?,
            store_url: require("STORE_URL")?,
            store_api_key: require("STORE_API_KEY")?,
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}
