//! User directory repository.
//!
//! Postgres implementation of the engine's [`Directory`] contract plus the
//! query surface used by the user API. Statements use the runtime query API:
//! the uniqueness guarantees live in the schema (primary key on
//! `external_id`, unique index on `email`) and unique violations are mapped
//! to [`RepositoryError::Conflict`] rather than surfaced as raw database
//! errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use wheelhouse_core::{Email, ExternalId, UserRole};

use crate::models::{NewUser, ProfileOverrides, ProfilePatch, UserRecord};
use crate::reconcile::Directory;

use super::RepositoryError;

const USER_COLUMNS: &str =
    "external_id, email, first_name, last_name, image_url, role, phone_number, created_at";

/// Filters and pagination for listing directory records.
#[derive(Debug, Clone)]
pub struct UserQuery {
    pub external_id: Option<ExternalId>,
    pub email: Option<Email>,
    pub role: Option<UserRole>,
    pub limit: i64,
    pub skip: i64,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            external_id: None,
            email: None,
            role: None,
            limit: 50,
            skip: 0,
        }
    }
}

/// One page of directory records plus the unpaginated total.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub total: i64,
}

/// Repository for user directory operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn hydrate(row: &PgRow) -> Result<UserRecord, RepositoryError> {
        let external_id: String = row.try_get("external_id")?;
        let external_id = ExternalId::parse(&external_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid external id in database: {e}"))
        })?;

        let email: Option<String> = row.try_get("email")?;
        let email = email
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;

        let role: String = row.try_get("role")?;
        let role: UserRole = role.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid role in database: {e}"))
        })?;

        Ok(UserRecord {
            external_id,
            email,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            image_url: row.try_get("image_url")?,
            role,
            phone_number: row.try_get("phone_number")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn map_insert_error(e: sqlx::Error) -> RepositoryError {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(
                db_err
                    .constraint()
                    .map_or_else(|| "unique constraint".to_owned(), ToOwned::to_owned),
            );
        }
        RepositoryError::Database(e)
    }

    /// Set a user's phone number (the in-app phone flow, not an identity
    /// event).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_phone(
        &self,
        id: &ExternalId,
        phone_number: &str,
    ) -> Result<UserRecord, RepositoryError> {
        let sql = format!(
            "UPDATE users SET phone_number = $2 WHERE external_id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(phone_number)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(Self::hydrate)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// List directory records matching the given filters, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either query fails.
    pub async fn list(&self, query: &UserQuery) -> Result<UserPage, RepositoryError> {
        let mut select: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        let mut count: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");

        for builder in [&mut select, &mut count] {
            if let Some(external_id) = &query.external_id {
                builder.push(" AND external_id = ").push_bind(external_id.as_str());
            }
            if let Some(email) = &query.email {
                builder.push(" AND email = ").push_bind(email.as_str());
            }
            if let Some(role) = query.role {
                builder.push(" AND role = ").push_bind(role.as_str());
            }
        }
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.skip);

        let rows = select.build().fetch_all(&self.pool).await?;
        let users = rows
            .iter()
            .map(Self::hydrate)
            .collect::<Result<Vec<_>, _>>()?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(UserPage { users, total })
    }
}

#[async_trait]
impl Directory for UserRepository {
    async fn find_by_external_id(
        &self,
        id: &ExternalId,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::hydrate).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<UserRecord>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::hydrate).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (external_id, email, first_name, last_name, image_url, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user.external_id.as_str())
            .bind(user.email.as_ref().map(Email::as_str))
            .bind(user.first_name.as_deref())
            .bind(user.last_name.as_deref())
            .bind(user.image_url.as_deref())
            .bind(UserRole::default().as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_insert_error)?;

        Self::hydrate(&row)
    }

    async fn rekey(
        &self,
        old: &ExternalId,
        new: &ExternalId,
        overrides: ProfileOverrides,
    ) -> Result<UserRecord, RepositoryError> {
        // NULLIF folds empty strings into NULL so COALESCE keeps the old
        // value: the non-empty-wins merge rule, expressed in one statement.
        let sql = format!(
            "UPDATE users SET \
                 external_id = $2, \
                 first_name = COALESCE(NULLIF($3, ''), first_name), \
                 last_name = COALESCE(NULLIF($4, ''), last_name), \
                 image_url = COALESCE(NULLIF($5, ''), image_url) \
             WHERE external_id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(old.as_str())
            .bind(new.as_str())
            .bind(overrides.first_name.as_deref())
            .bind(overrides.last_name.as_deref())
            .bind(overrides.image_url.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(Self::hydrate)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_profile(
        &self,
        id: &ExternalId,
        patch: ProfilePatch,
    ) -> Result<UserRecord, RepositoryError> {
        // COALESCE leaves fields the event did not carry untouched; an
        // absent field is never nulled.
        let sql = format!(
            "UPDATE users SET \
                 email = COALESCE($2, email), \
                 first_name = COALESCE($3, first_name), \
                 last_name = COALESCE($4, last_name), \
                 image_url = COALESCE($5, image_url) \
             WHERE external_id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(patch.email.as_ref().map(Email::as_str))
            .bind(patch.first_name.as_deref())
            .bind(patch.last_name.as_deref())
            .bind(patch.image_url.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(Self::hydrate)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: &ExternalId) -> Result<UserRecord, RepositoryError> {
        let sql = format!("DELETE FROM users WHERE external_id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(Self::hydrate)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }
}
