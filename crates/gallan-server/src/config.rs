//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use gallan_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_SECS};
use gallan_store::Database;

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// The platform data directory (`~/.local/share/gallan/gallan.db` etc.).
    Default,
    /// A private in-memory database, lost on shutdown.
    InMemory,
    /// An explicit file path.
    Path(PathBuf),
}

impl DatabaseLocation {
    /// Open (and migrate) the database. Missing parent directories of an
    /// explicit path are created.
    pub fn open(&self) -> anyhow::Result<Database> {
        let db = match self {
            Self::Default => Database::new()?,
            Self::InMemory => {
                tracing::warn!("Using an in-memory database; all data is lost on shutdown");
                Database::open_in_memory()?
            }
            Self::Path(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                tracing::info!(path = %path.display(), "opening database");
                Database::open_at(path)?
            }
        };
        Ok(db)
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// Env: `DATABASE_PATH` (`:memory:` for an in-memory database)
    /// Default: platform data directory
    pub database: DatabaseLocation,

    /// Lifetime of a login session.
    /// Env: `SESSION_TTL_SECS`
    /// Default: 24 hours
    pub session_ttl: Duration,

    /// Human-readable name reported by `/health`.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Gallan"`
    pub instance_name: String,

    /// API key for the conversation starter service. Without it the static
    /// starters are served.
    /// Env: `OPENAI_API_KEY`
    pub openai_api_key: Option<String>,

    /// Env: `OPENAI_BASE_URL`
    /// Default: `https://api.openai.com/v1`
    pub openai_base_url: String,

    /// Env: `OPENAI_MODEL`
    /// Default: `gpt-4o`
    pub openai_model: String,

    /// Allow cross-origin requests from any origin.
    /// Env: `CORS_ALLOW_ANY` (true/false)
    /// Default: `true`
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database: DatabaseLocation::Default,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            instance_name: gallan_shared::constants::APP_NAME.to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o".to_string(),
            cors_allow_any: true,
        }
    }
}

// The API key must never end up in logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database", &self.database)
            .field("session_ttl", &self.session_ttl)
            .field("instance_name", &self.instance_name)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("cors_allow_any", &self.cors_allow_any)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database = match path.trim() {
                "" => DatabaseLocation::Default,
                ":memory:" => DatabaseLocation::InMemory,
                other => DatabaseLocation::Path(PathBuf::from(other)),
            };
        }

        if let Some(val) = lookup("SESSION_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.session_ttl = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_SECS, using default"),
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.openai_api_key = Some(key.trim().to_string());
            }
        }

        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.openai_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(model) = lookup("OPENAI_MODEL") {
            config.openai_model = model;
        }

        if let Some(val) = lookup("CORS_ALLOW_ANY") {
            config.cors_allow_any = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
