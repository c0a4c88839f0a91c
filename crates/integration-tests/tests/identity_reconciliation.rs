//! Integration tests for identity-provider lifecycle reconciliation.
//!
//! These tests require:
//! - A running `PostgreSQL` database with identity migrations applied
//! - The identity service running (cargo run -p wheelhouse-identity)
//!
//! Run with: cargo test -p wheelhouse-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL for the identity service (configurable via environment).
fn identity_base_url() -> String {
    std::env::var("IDENTITY_BASE_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// Connect to the identity database for seeding reference rows.
async fn db_pool() -> PgPool {
    let url = std::env::var("IDENTITY_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("IDENTITY_DATABASE_URL must be set for integration tests");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to identity database")
}

fn http_client() -> Client {
    Client::new()
}

/// Unique external id / email per test run so reruns don't collide.
fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Deliver a provider webhook event.
async fn deliver(client: &Client, kind: &str, data: Value) -> reqwest::Response {
    client
        .post(format!("{}/api/webhook/identity", identity_base_url()))
        .json(&json!({"type": kind, "data": data}))
        .send()
        .await
        .expect("Failed to deliver webhook event")
}

fn created_payload(external_id: &str, email: &str, first_name: &str, last_name: &str) -> Value {
    json!({
        "id": external_id,
        "first_name": first_name,
        "last_name": last_name,
        "email_addresses": [{"email_address": email}],
        "image_url": "https://img.example/avatar.png",
    })
}

async fn fetch_profile(client: &Client, external_id: &str) -> reqwest::Response {
    client
        .get(format!("{}/api/users/{external_id}", identity_base_url()))
        .send()
        .await
        .expect("Failed to fetch profile")
}

async fn count_rows(pool: &PgPool, table: &str, column: &str, key: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = $1");
    sqlx::query_scalar(&sql)
        .bind(key)
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running identity service and PostgreSQL"]
async fn test_created_event_inserts_user() {
    let client = http_client();
    let external_id = unique("user");
    let email = format!("{}@example.com", unique("created"));

    let resp = deliver(
        &client,
        "user.created",
        created_payload(&external_id, &email, "Jane", "Doe"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = fetch_profile(&client, &external_id).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse profile");
    assert_eq!(body["user"]["first_name"], "Jane");
    assert_eq!(body["user"]["last_name"], "Doe");
}

#[tokio::test]
#[ignore = "Requires running identity service and PostgreSQL"]
async fn test_created_redelivery_is_idempotent() {
    let client = http_client();
    let external_id = unique("user");
    let email = format!("{}@example.com", unique("redelivered"));
    let payload = created_payload(&external_id, &email, "Jane", "Doe");

    let first = deliver(&client, "user.created", payload.clone()).await;
    let second = deliver(&client, "user.created", payload).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running identity service and PostgreSQL"]
async fn test_colliding_created_rekeys_references() {
    let client = http_client();
    let pool = db_pool().await;
    let old_id = unique("user_old");
    let new_id = unique("user_new");
    let email = format!("{}@example.com", unique("collision"));

    let resp = deliver(
        &client,
        "user.created",
        created_payload(&old_id, &email, "Jane", "Doe"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Seed rows that reference the old identity.
    for n in 0..3 {
        sqlx::query("INSERT INTO vehicles (owner_id, name) VALUES ($1, $2)")
            .bind(&old_id)
            .bind(format!("Vehicle {n}"))
            .execute(&pool)
            .await
            .expect("Failed to seed vehicle");
    }
    sqlx::query("INSERT INTO reviews (author_id, subject_id, rating) VALUES ($1, $2, 5)")
        .bind(&old_id)
        .bind(unique("subject"))
        .execute(&pool)
        .await
        .expect("Failed to seed review");
    sqlx::query(
        "INSERT INTO payments (payer_id, amount_cents, reference) VALUES ($1, 15000, $2)",
    )
    .bind(&old_id)
    .bind(unique("payment"))
    .execute(&pool)
    .await
    .expect("Failed to seed payment");

    // Same email arrives under a fresh provider id: the account was
    // recreated at the provider.
    let resp = deliver(
        &client,
        "user.created",
        created_payload(&new_id, &email, "Jane", "Doe"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Every reference follows the new identity; none point at the old one.
    assert_eq!(count_rows(&pool, "vehicles", "owner_id", &new_id).await, 3);
    assert_eq!(count_rows(&pool, "reviews", "author_id", &new_id).await, 1);
    assert_eq!(count_rows(&pool, "payments", "payer_id", &new_id).await, 1);
    assert_eq!(count_rows(&pool, "vehicles", "owner_id", &old_id).await, 0);
    assert_eq!(count_rows(&pool, "reviews", "author_id", &old_id).await, 0);
    assert_eq!(count_rows(&pool, "payments", "payer_id", &old_id).await, 0);

    assert_eq!(
        fetch_profile(&client, &new_id).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        fetch_profile(&client, &old_id).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
#[ignore = "Requires running identity service and PostgreSQL"]
async fn test_deleted_event_cascades_and_is_idempotent() {
    let client = http_client();
    let pool = db_pool().await;
    let external_id = unique("user");
    let email = format!("{}@example.com", unique("deleted"));

    let resp = deliver(
        &client,
        "user.created",
        created_payload(&external_id, &email, "Jane", "Doe"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    for n in 0..2 {
        sqlx::query("INSERT INTO vehicles (owner_id, name) VALUES ($1, $2)")
            .bind(&external_id)
            .bind(format!("Vehicle {n}"))
            .execute(&pool)
            .await
            .expect("Failed to seed vehicle");
    }
    sqlx::query("INSERT INTO notifications (recipient_id, body) VALUES ($1, 'Listing approved')")
        .bind(&external_id)
        .execute(&pool)
        .await
        .expect("Failed to seed notification");

    let resp = deliver(&client, "user.deleted", json!({"id": external_id, "deleted": true})).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(
        count_rows(&pool, "vehicles", "owner_id", &external_id).await,
        0
    );
    assert_eq!(
        count_rows(&pool, "notifications", "recipient_id", &external_id).await,
        0
    );
    assert_eq!(
        fetch_profile(&client, &external_id).await.status(),
        StatusCode::NOT_FOUND
    );

    // Redelivery of the same deletion acknowledges without side effects.
    let resp = deliver(&client, "user.deleted", json!({"id": external_id, "deleted": true})).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running identity service and PostgreSQL"]
async fn test_updated_applies_partial_profile() {
    let client = http_client();
    let external_id = unique("user");
    let email = format!("{}@example.com", unique("updated"));

    let resp = deliver(
        &client,
        "user.created",
        created_payload(&external_id, &email, "John", "Doe"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = deliver(
        &client,
        "user.updated",
        json!({"id": external_id, "first_name": "Jane"}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = fetch_profile(&client, &external_id)
        .await
        .json()
        .await
        .expect("Failed to parse profile");
    assert_eq!(body["user"]["first_name"], "Jane");
    assert_eq!(body["user"]["last_name"], "Doe");
}

#[tokio::test]
#[ignore = "Requires running identity service and PostgreSQL"]
async fn test_unknown_event_kind_is_acknowledged() {
    let client = http_client();

    let resp = deliver(&client, "session.created", json!({"id": unique("session")})).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse ack");
    assert_eq!(body["ok"], true);
}

#[tokio::test]
#[ignore = "Requires running identity service and PostgreSQL"]
async fn test_phone_flow_sets_number() {
    let client = http_client();
    let external_id = unique("user");
    let email = format!("{}@example.com", unique("phone"));

    let resp = deliver(
        &client,
        "user.created",
        created_payload(&external_id, &email, "Jane", "Doe"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .patch(format!(
            "{}/api/users/{external_id}/phone",
            identity_base_url()
        ))
        .json(&json!({"phone_number": "+15551234567"}))
        .send()
        .await
        .expect("Failed to patch phone");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = fetch_profile(&client, &external_id)
        .await
        .json()
        .await
        .expect("Failed to parse profile");
    assert_eq!(body["user"]["phone_number"], "+15551234567");
}
