//! In-memory store fakes for engine and cascade tests.
//!
//! These mirror the contracts of the Postgres repositories: the directory
//! enforces both uniqueness constraints, and the graph's bulk operations are
//! idempotent. `FlakyGraph` injects per-step failures to exercise the
//! partial-cascade paths.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use wheelhouse_core::{Email, ExternalId, UserRole};

use crate::db::RepositoryError;
use crate::models::{NewUser, ProfileOverrides, ProfilePatch, UserRecord};

use super::cascade::StepError;
use super::graph::ReferenceField;
use super::{Directory, ReferenceGraph};

/// In-memory user directory keyed by external id.
#[derive(Default)]
pub struct MemoryDirectory {
    rows: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryDirectory {
    pub fn get(&self, external_id: &str) -> Option<UserRecord> {
        self.rows.lock().unwrap().get(external_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn set_phone(&self, external_id: &str, phone: &str) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(external_id).ok_or(RepositoryError::NotFound)?;
        record.phone_number = Some(phone.to_owned());
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_by_external_id(
        &self,
        id: &ExternalId,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self.get(id.as_str()))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|r| r.email.as_ref() == Some(email))
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(user.external_id.as_str()) {
            return Err(RepositoryError::Conflict(
                "external id already exists".to_owned(),
            ));
        }
        if let Some(email) = &user.email
            && rows.values().any(|r| r.email.as_ref() == Some(email))
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let record = UserRecord {
            external_id: user.external_id.clone(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            image_url: user.image_url,
            role: UserRole::default(),
            phone_number: None,
            created_at: Utc::now(),
        };
        rows.insert(user.external_id.into_inner(), record.clone());
        Ok(record)
    }

    async fn rekey(
        &self,
        old: &ExternalId,
        new: &ExternalId,
        overrides: ProfileOverrides,
    ) -> Result<UserRecord, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let mut record = rows.remove(old.as_str()).ok_or(RepositoryError::NotFound)?;

        record.external_id = new.clone();
        record.first_name = ProfileOverrides::merge(
            overrides.first_name.as_deref(),
            record.first_name.as_deref(),
        );
        record.last_name =
            ProfileOverrides::merge(overrides.last_name.as_deref(), record.last_name.as_deref());
        record.image_url =
            ProfileOverrides::merge(overrides.image_url.as_deref(), record.image_url.as_deref());

        rows.insert(new.as_str().to_owned(), record.clone());
        Ok(record)
    }

    async fn update_profile(
        &self,
        id: &ExternalId,
        patch: ProfilePatch,
    ) -> Result<UserRecord, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(id.as_str()).ok_or(RepositoryError::NotFound)?;

        if let Some(email) = patch.email {
            record.email = Some(email);
        }
        if let Some(first_name) = patch.first_name {
            record.first_name = Some(first_name);
        }
        if let Some(last_name) = patch.last_name {
            record.last_name = Some(last_name);
        }
        if let Some(image_url) = patch.image_url {
            record.image_url = Some(image_url);
        }

        Ok(record.clone())
    }

    async fn delete(&self, id: &ExternalId) -> Result<UserRecord, RepositoryError> {
        self.rows
            .lock()
            .unwrap()
            .remove(id.as_str())
            .ok_or(RepositoryError::NotFound)
    }
}

/// In-memory reference graph: one list of foreign-key values per field, each
/// element standing for one referencing row.
#[derive(Default)]
pub struct MemoryGraph {
    rows: Mutex<HashMap<ReferenceField, Vec<String>>>,
    rewrites: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryGraph {
    /// Seed `count` rows referencing `key` under `field`.
    pub fn seed(&self, field: ReferenceField, key: &str, count: usize) {
        self.rows
            .lock()
            .unwrap()
            .entry(field)
            .or_default()
            .extend(std::iter::repeat_n(key.to_owned(), count));
    }

    /// Number of rows referencing `key` under `field`.
    pub fn count(&self, field: ReferenceField, key: &str) -> u64 {
        self.rows
            .lock()
            .unwrap()
            .get(&field)
            .map_or(0, |rows| rows.iter().filter(|k| *k == key).count() as u64)
    }

    /// Number of rows referencing `key` across the whole graph.
    pub fn total_referencing(&self, key: &str) -> u64 {
        self.rows
            .lock()
            .unwrap()
            .values()
            .flat_map(|rows| rows.iter())
            .filter(|k| *k == key)
            .count() as u64
    }

    pub fn rewrite_calls(&self) -> u64 {
        self.rewrites.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceGraph for MemoryGraph {
    async fn rewrite_foreign_key(
        &self,
        field: ReferenceField,
        old: &ExternalId,
        new: &ExternalId,
    ) -> Result<u64, StepError> {
        self.rewrites.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let mut touched = 0;
        for value in rows.entry(field).or_default() {
            if *value == old.as_str() {
                *value = new.as_str().to_owned();
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete_by_foreign_key(
        &self,
        field: ReferenceField,
        key: &ExternalId,
    ) -> Result<u64, StepError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let entry = rows.entry(field).or_default();
        let before = entry.len();
        entry.retain(|value| value != key.as_str());
        Ok((before - entry.len()) as u64)
    }
}

/// Wraps a [`MemoryGraph`] and fails a configured number of attempts per
/// field before letting calls through.
pub struct FlakyGraph {
    inner: MemoryGraph,
    failures: Mutex<HashMap<ReferenceField, u32>>,
}

impl FlakyGraph {
    pub fn new(inner: MemoryGraph) -> Self {
        Self {
            inner,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &MemoryGraph {
        &self.inner
    }

    /// Make the next `attempts` operations on `field` fail.
    pub fn fail_next(&self, field: ReferenceField, attempts: u32) {
        *self.failures.lock().unwrap().entry(field).or_insert(0) += attempts;
    }

    fn should_fail(&self, field: ReferenceField) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&field) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ReferenceGraph for FlakyGraph {
    async fn rewrite_foreign_key(
        &self,
        field: ReferenceField,
        old: &ExternalId,
        new: &ExternalId,
    ) -> Result<u64, StepError> {
        if self.should_fail(field) {
            return Err(StepError(format!("injected failure on {field}")));
        }
        self.inner.rewrite_foreign_key(field, old, new).await
    }

    async fn delete_by_foreign_key(
        &self,
        field: ReferenceField,
        key: &ExternalId,
    ) -> Result<u64, StepError> {
        if self.should_fail(field) {
            return Err(StepError(format!("injected failure on {field}")));
        }
        self.inner.delete_by_foreign_key(field, key).await
    }
}
