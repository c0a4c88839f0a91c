//! Core types for Wheelhouse.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod external_id;
pub mod role;

pub use email::{Email, EmailError};
pub use external_id::{ExternalId, ExternalIdError};
pub use role::{UnknownRole, UserRole};
