//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database. When unset the platform
    /// data directory is used.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Beacon Node"`
    pub instance_name: String,

    /// How long an issued sign-in nonce stays valid.
    /// Env: `NONCE_TTL_SECS`
    /// Default: 300
    pub nonce_ttl: Duration,

    /// How long a session token stays valid.
    /// Env: `SESSION_TTL_SECS`
    /// Default: 3600
    pub session_ttl: Duration,

    /// Sustained requests per second allowed per client IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: 10
    pub rate_limit_per_sec: u32,

    /// Burst size for the per-IP rate limit.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: 30
    pub rate_limit_burst: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            instance_name: "Beacon Node".to_string(),
            nonce_ttl: Duration::from_secs(300),
            session_ttl: Duration::from_secs(3600),
            rate_limit_per_sec: 10,
            rate_limit_burst: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(secs) = env_u64("NONCE_TTL_SECS") {
            config.nonce_ttl = Duration::from_secs(secs);
        }

        if let Some(secs) = env_u64("SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(secs);
        }

        if let Some(n) = env_u64("RATE_LIMIT_PER_SEC") {
            config.rate_limit_per_sec = n as u32;
        }

        if let Some(n) = env_u64("RATE_LIMIT_BURST") {
            config.rate_limit_burst = n as u32;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid numeric env var, using default");
            None
        }
    }
}
