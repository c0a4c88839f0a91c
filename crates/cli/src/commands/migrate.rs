//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! # Run identity migrations
//! wh-cli migrate identity
//! ```
//!
//! # Environment Variables
//!
//! - `IDENTITY_DATABASE_URL` - `PostgreSQL` connection string for the
//!   identity database (falls back to `DATABASE_URL`)
//!
//! Migration files live in `crates/identity/migrations/` and are embedded
//! into the binary at compile time.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

/// Errors that can occur while running migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run identity database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database URL is missing, the connection
/// fails, or a migration fails to apply.
pub async fn identity() -> Result<(), MigrationError> {
    let _ = dotenvy::dotenv();

    let database_url = database_url("IDENTITY_DATABASE_URL")?;

    tracing::info!("Connecting to identity database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running identity migrations...");
    sqlx::migrate!("../identity/migrations").run(&pool).await?;

    tracing::info!("Identity migrations complete!");
    Ok(())
}

/// Read the database URL, falling back to the generic `DATABASE_URL`.
fn database_url(primary_key: &'static str) -> Result<SecretString, MigrationError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar(primary_key))
}
