//! Reference graph repository.
//!
//! Postgres implementation of the engine's [`ReferenceGraph`] contract. Each
//! operation is one bulk statement per (collection, field) pair, never a
//! row-by-row loop, and affects zero rows when re-run, which is what makes
//! cascade retries safe. Table and column identifiers are interpolated from
//! the static reference-graph table; only key values are bound parameters.

use async_trait::async_trait;
use sqlx::PgPool;

use wheelhouse_core::ExternalId;

use crate::reconcile::{ReferenceField, ReferenceGraph, StepError};

/// Repository for bulk foreign-key operations across referencing
/// collections.
#[derive(Clone)]
pub struct ReferenceRepository {
    pool: PgPool,
}

impl ReferenceRepository {
    /// Create a new reference repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceGraph for ReferenceRepository {
    async fn rewrite_foreign_key(
        &self,
        field: ReferenceField,
        old: &ExternalId,
        new: &ExternalId,
    ) -> Result<u64, StepError> {
        let sql = format!(
            "UPDATE {} SET {} = $2 WHERE {} = $1",
            field.collection, field.column, field.column
        );
        let done = sqlx::query(&sql)
            .bind(old.as_str())
            .bind(new.as_str())
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected())
    }

    async fn delete_by_foreign_key(
        &self,
        field: ReferenceField,
        key: &ExternalId,
    ) -> Result<u64, StepError> {
        let sql = format!("DELETE FROM {} WHERE {} = $1", field.collection, field.column);
        let done = sqlx::query(&sql)
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected())
    }
}
