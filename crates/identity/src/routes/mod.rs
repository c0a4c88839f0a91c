//! HTTP route handlers for the identity service.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health                    - Liveness check
//! GET   /health/ready              - Readiness check (database round-trip)
//!
//! # Provider webhook
//! GET   /api/webhook/identity      - Endpoint probe
//! POST  /api/webhook/identity      - Lifecycle event delivery
//!
//! # Users
//! GET   /api/users                 - List users (filters + pagination)
//! GET   /api/users/{id}            - Public profile by external id
//! PATCH /api/users/{id}/phone      - In-app phone-number flow
//!
//! # Uploads
//! POST  /api/images                - Relay an image to the file host
//! ```

pub mod images;
pub mod users;
pub mod webhook;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the user API router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list))
        .route("/{id}", get(users::get_user))
        .route("/{id}/phone", patch(users::update_phone))
}

/// Create all routes for the identity service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/webhook/identity",
            get(webhook::probe).post(webhook::receive),
        )
        .nest("/api/users", user_routes())
        .route("/api/images", post(images::upload))
}
