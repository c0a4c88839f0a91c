//! Integration tests for Wheelhouse.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and run migrations
//! cargo run -p wheelhouse-cli -- migrate identity
//!
//! # Start the identity service
//! cargo run -p wheelhouse-identity
//!
//! # Run integration tests
//! cargo test -p wheelhouse-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `identity_reconciliation` - Webhook-driven lifecycle tests against a
//!   running service, seeding reference rows directly through the database
//!
//! Tests are `#[ignore]`d by default because they need a running service
//! and a reachable `PostgreSQL` instance (`IDENTITY_BASE_URL`,
//! `IDENTITY_DATABASE_URL`).
