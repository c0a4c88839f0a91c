//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::IdentityConfig;
use crate::db::{ReferenceRepository, UserRepository};
use crate::reconcile::Reconciler;
use crate::services::filehost::{FileHostClient, FileHostError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and the reconciliation engine.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: IdentityConfig,
    pool: PgPool,
    users: UserRepository,
    reconciler: Reconciler<UserRepository, ReferenceRepository>,
    filehost: Option<FileHostClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file host client cannot be constructed from
    /// the configuration.
    pub fn new(config: IdentityConfig, pool: PgPool) -> Result<Self, FileHostError> {
        let users = UserRepository::new(pool.clone());
        let reconciler = Reconciler::new(
            UserRepository::new(pool.clone()),
            ReferenceRepository::new(pool.clone()),
        );
        let filehost = config
            .filehost
            .as_ref()
            .map(FileHostClient::new)
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                users,
                reconciler,
                filehost,
            }),
        })
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &IdentityConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the user repository.
    #[must_use]
    pub fn users(&self) -> &UserRepository {
        &self.inner.users
    }

    /// Get a reference to the reconciliation engine.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler<UserRepository, ReferenceRepository> {
        &self.inner.reconciler
    }

    /// Get a reference to the file host client, if configured.
    #[must_use]
    pub fn filehost(&self) -> Option<&FileHostClient> {
        self.inner.filehost.as_ref()
    }
}
