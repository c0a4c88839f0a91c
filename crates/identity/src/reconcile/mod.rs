//! Identity reconciliation engine.
//!
//! Consumes verified lifecycle events from the external identity provider
//! and keeps the local user directory consistent with it:
//!
//! - `user.created` inserts a fresh record. When the email already belongs
//!   to a record under a different external id, it instead re-keys that
//!   record and rewrites every referencing row to the new id.
//! - `user.updated` patches the profile in place, synthesizing the record if
//!   the `Created` event has not landed yet.
//! - `user.deleted` removes every referencing row and then the record itself.
//!
//! The provider delivers at least once, so every path here is idempotent and
//! every failure is surfaced as retryable. There is no cross-document
//! transaction: cascades are independent idempotent bulk steps whose partial
//! completion stays visible (see [`cascade`]).
//!
//! The engine owns no connections. It is written against the [`Directory`]
//! and [`ReferenceGraph`] traits and receives implementations at
//! construction, which is also what lets the reconciliation properties be
//! tested against in-memory stores.

pub mod cascade;
pub mod engine;
pub mod event;
pub mod graph;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use wheelhouse_core::{Email, ExternalId};

use crate::db::RepositoryError;
use crate::models::{NewUser, ProfileOverrides, ProfilePatch, UserRecord};

pub use cascade::StepError;
pub use engine::Reconciler;
pub use event::{LifecycleEvent, Outcome};
pub use graph::ReferenceField;

/// The authoritative local user store, keyed by the provider's external id
/// with a secondary uniqueness constraint on email.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a record by its external id.
    async fn find_by_external_id(
        &self,
        id: &ExternalId,
    ) -> Result<Option<UserRecord>, RepositoryError>;

    /// Look up a record by its email address.
    async fn find_by_email(&self, email: &Email) -> Result<Option<UserRecord>, RepositoryError>;

    /// Insert a fresh record.
    ///
    /// Must reject with [`RepositoryError::Conflict`] when the email or
    /// external id already exists, never silently overwrite. The email
    /// conflict is what triggers collision resolution.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, RepositoryError>;

    /// Change the primary identity key of an existing record in place,
    /// merging `overrides` per the non-empty-wins rule.
    ///
    /// Returns [`RepositoryError::NotFound`] when no record exists under
    /// `old`.
    async fn rekey(
        &self,
        old: &ExternalId,
        new: &ExternalId,
        overrides: ProfileOverrides,
    ) -> Result<UserRecord, RepositoryError>;

    /// Apply the supplied profile fields; absent fields are left untouched.
    async fn update_profile(
        &self,
        id: &ExternalId,
        patch: ProfilePatch,
    ) -> Result<UserRecord, RepositoryError>;

    /// Delete the record, returning it.
    async fn delete(&self, id: &ExternalId) -> Result<UserRecord, RepositoryError>;
}

/// Bulk operations over the fixed set of collections that reference a user
/// by external id (see [`graph::REFERENCE_GRAPH`]).
///
/// Both operations are bulk per (collection, field) and naturally
/// idempotent: re-rewriting an already-rewritten row or re-deleting an
/// already-deleted row affects zero rows and is not an error.
#[async_trait]
pub trait ReferenceGraph: Send + Sync {
    /// Point every row where `field == old` at `new`. Returns the number of
    /// rows rewritten.
    async fn rewrite_foreign_key(
        &self,
        field: ReferenceField,
        old: &ExternalId,
        new: &ExternalId,
    ) -> Result<u64, StepError>;

    /// Delete every row where `field == key`. Returns the number of rows
    /// deleted.
    async fn delete_by_foreign_key(
        &self,
        field: ReferenceField,
        key: &ExternalId,
    ) -> Result<u64, StepError>;
}
