//! Database operations for the identity `PostgreSQL` database.
//!
//! # Database: `wh_identity`
//!
//! ## Tables
//!
//! - `users` - The user directory, keyed by the provider's external id
//! - `vehicles`, `properties` - Listings referencing their owner
//! - `notifications` - Per-user notifications
//! - `reviews` - Reference a user as author and as subject
//! - `reports` - Reference a user as reporter and as subject
//! - `requests` - Reference a user as sender and as receiver
//! - `payments` - Reference the paying user
//!
//! # Migrations
//!
//! Migrations are stored in `crates/identity/migrations/` and run via:
//! ```bash
//! cargo run -p wheelhouse-cli -- migrate identity
//! ```

pub mod references;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use references::ReferenceRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
