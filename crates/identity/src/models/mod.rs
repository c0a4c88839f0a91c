//! Domain types for the identity service.

pub mod user;

pub use user::{NewUser, ProfileOverrides, ProfilePatch, PublicProfile, UserRecord};
