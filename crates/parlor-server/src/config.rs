use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Server settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub jwt_secret: String,
    /// Remote Stargate push service; the in-process provider is used when unset.
    pub stargate_url: Option<String>,
    pub stargate_token: String,
    pub listen_address: String,
    pub provider_timeout: Duration,
    pub group_image_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = var_or("PARLOR_HOST", "0.0.0.0");
        let port: u16 = var_or("PARLOR_PORT", "3000")
            .parse()
            .context("PARLOR_PORT must be a port number")?;
        let timeout_ms: u64 = var_or("PARLOR_PROVIDER_TIMEOUT_MS", "5000")
            .parse()
            .context("PARLOR_PROVIDER_TIMEOUT_MS must be a number of milliseconds")?;

        Ok(Self {
            db_path: PathBuf::from(var_or("PARLOR_DB_PATH", "parlor.db")),
            addr: format!("{}:{}", host, port).parse()?,
            jwt_secret: var_or("PARLOR_JWT_SECRET", "dev-secret-change-me"),
            stargate_url: std::env::var("PARLOR_STARGATE_URL").ok().filter(|s| !s.is_empty()),
            stargate_token: var_or("PARLOR_STARGATE_TOKEN", ""),
            listen_address: var_or("PARLOR_LISTEN_ADDRESS", "ws://localhost:3000"),
            provider_timeout: Duration::from_millis(timeout_ms),
            group_image_path: var_or("PARLOR_GROUP_IMAGE_PATH", ""),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}
