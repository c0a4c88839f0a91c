//! The reference graph: every foreign-key location that stores a user's
//! external id.
//!
//! This table is the single source of truth for cascades. Adding a new
//! collection that references users means adding a row here (and its
//! migration); nothing else in the engine changes.

use core::fmt;

/// One foreign-key location in the reference graph.
///
/// `collection` and `column` are SQL identifiers taken from this module's
/// static table, never from request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceField {
    /// Table holding the reference.
    pub collection: &'static str,
    /// Column storing the user's external id.
    pub column: &'static str,
}

impl ReferenceField {
    const fn new(collection: &'static str, column: &'static str) -> Self {
        Self { collection, column }
    }
}

impl fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.collection, self.column)
    }
}

/// Every (collection, field) pair that references a user.
///
/// Reviews, reports and requests each carry two role fields per row, so they
/// appear twice.
pub const REFERENCE_GRAPH: &[ReferenceField] = &[
    ReferenceField::new("vehicles", "owner_id"),
    ReferenceField::new("properties", "owner_id"),
    ReferenceField::new("notifications", "recipient_id"),
    ReferenceField::new("reviews", "author_id"),
    ReferenceField::new("reviews", "subject_id"),
    ReferenceField::new("reports", "reporter_id"),
    ReferenceField::new("reports", "subject_id"),
    ReferenceField::new("requests", "sender_id"),
    ReferenceField::new("requests", "receiver_id"),
    ReferenceField::new("payments", "payer_id"),
];
