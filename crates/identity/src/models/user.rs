//! User directory domain types.
//!
//! These types represent validated domain objects separate from database row
//! types. The directory row is keyed by the identity provider's external id;
//! every other collection in the marketplace references users by that key.

use chrono::{DateTime, Utc};
use serde::Serialize;

use wheelhouse_core::{Email, ExternalId, UserRole};

/// A user directory record (domain type).
///
/// The local mirror of an identity-provider account. `external_id` is the
/// primary key and the value referenced by listings, reviews, reports,
/// requests, notifications and payments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable identifier issued by the identity provider.
    pub external_id: ExternalId,
    /// Unique email address; the collision axis for reconciliation.
    ///
    /// Absent only for records synthesized from an `Updated` event that
    /// carried no address.
    pub email: Option<Email>,
    /// Display first name.
    pub first_name: Option<String>,
    /// Display last name.
    pub last_name: Option<String>,
    /// Profile image reference.
    pub image_url: Option<String>,
    /// Marketplace role; never changed by identity events.
    pub role: UserRole,
    /// Populated by the in-app phone flow, not by identity events.
    pub phone_number: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a fresh directory record.
///
/// `role` always starts as [`UserRole::Customer`] and `created_at` is set by
/// the store; neither is caller-supplied.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: ExternalId,
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

/// Partial profile update from an `Updated` event.
///
/// `None` means "not supplied, leave untouched"; an absent field is never
/// nulled out.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

/// Profile fields carried by a colliding `Created` event, merged into the
/// surviving record during a re-key.
///
/// Merge rule: a new non-empty value wins, otherwise the old value is kept.
/// The provider wire format cannot distinguish "cleared" from "not supplied",
/// so an empty string never overwrites.
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

impl ProfileOverrides {
    /// Merge one override over an existing value.
    #[must_use]
    pub fn merge(new: Option<&str>, old: Option<&str>) -> Option<String> {
        match new {
            Some(v) if !v.is_empty() => Some(v.to_owned()),
            _ => old.map(ToOwned::to_owned),
        }
    }
}

/// Public projection of a user record, safe to expose to other users.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRole,
}

impl From<&UserRecord> for PublicProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image_url: user.image_url.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role,
        }
    }
}
