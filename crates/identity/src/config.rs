//! Identity service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `IDENTITY_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! ## Optional
//! - `IDENTITY_HOST` - Bind address (default: 127.0.0.1)
//! - `IDENTITY_PORT` - Listen port (default: 4000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## File host (all-or-nothing; the image relay is disabled when unset)
//! - `FILEHOST_API_URL` - File-manager API base URL
//! - `FILEHOST_USERNAME` - Account username for token auth
//! - `FILEHOST_API_TOKEN` - API token
//! - `FILEHOST_PUBLIC_DOMAIN` - Domain public URLs are served from
//! - `FILEHOST_TIMEOUT_SECS` - Upload request timeout (default: 30)

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Identity service configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// File host relay configuration; `None` disables the image relay
    pub filehost: Option<FileHostConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote file host (cPanel-style file-manager API) configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct FileHostConfig {
    /// File-manager API base URL (e.g., <https://host.example:2083>)
    pub api_url: String,
    /// Account username for token auth
    pub username: String,
    /// API token (server-side only)
    pub api_token: SecretString,
    /// Domain that serves the uploaded files publicly
    pub public_domain: String,
    /// Upload request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for FileHostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHostConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("api_token", &"[REDACTED]")
            .field("public_domain", &self.public_domain)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl IdentityConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("IDENTITY_DATABASE_URL")?;
        let host = get_env_or_default("IDENTITY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("IDENTITY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("IDENTITY_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("IDENTITY_PORT".to_string(), e.to_string()))?;

        let filehost = FileHostConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            filehost,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl FileHostConfig {
    /// Loads the file host block, `None` when no `FILEHOST_*` variable is
    /// set, an error when the block is only partially configured.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let api_url = get_optional_env("FILEHOST_API_URL");
        let username = get_optional_env("FILEHOST_USERNAME");
        let api_token = get_optional_env("FILEHOST_API_TOKEN");
        let public_domain = get_optional_env("FILEHOST_PUBLIC_DOMAIN");

        if api_url.is_none() && username.is_none() && api_token.is_none() && public_domain.is_none()
        {
            return Ok(None);
        }

        let timeout_secs = get_env_or_default("FILEHOST_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("FILEHOST_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Some(Self {
            api_url: api_url
                .ok_or_else(|| ConfigError::MissingEnvVar("FILEHOST_API_URL".to_string()))?,
            username: username
                .ok_or_else(|| ConfigError::MissingEnvVar("FILEHOST_USERNAME".to_string()))?,
            api_token: SecretString::from(
                api_token
                    .ok_or_else(|| ConfigError::MissingEnvVar("FILEHOST_API_TOKEN".to_string()))?,
            ),
            public_domain: public_domain
                .ok_or_else(|| ConfigError::MissingEnvVar("FILEHOST_PUBLIC_DOMAIN".to_string()))?,
            timeout_secs,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
