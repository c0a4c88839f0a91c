//! Identity provider webhook ingress.
//!
//! Receives lifecycle event payloads from the identity provider and feeds
//! them to the reconciliation engine. Signature verification happens
//! upstream (the provider's delivery layer in front of this service); by the
//! time a payload reaches these handlers it is trusted.
//!
//! Acknowledgment contract: 2xx means durably processed, including
//! idempotent "already done" outcomes; anything else asks the provider to
//! redeliver. Unknown event kinds are acknowledged as no-ops so new
//! provider event types never wedge the delivery queue.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use wheelhouse_core::{Email, ExternalId};

use crate::reconcile::event::{CreatedUser, UpdatedUser};
use crate::reconcile::{LifecycleEvent, Outcome};
use crate::state::AppState;

const KIND_CREATED: &str = "user.created";
const KIND_UPDATED: &str = "user.updated";
const KIND_DELETED: &str = "user.deleted";

/// A raw provider event envelope.
///
/// `data` stays untyped until the kind is known: unsupported kinds carry
/// payload shapes this service does not model.
#[derive(Debug, Deserialize)]
pub struct ProviderEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

/// The provider's user payload, as delivered for user.* events.
#[derive(Debug, Deserialize)]
struct ProviderUserData {
    id: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ProviderEmail>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
    #[serde(default)]
    external_accounts: Vec<ProviderExternalAccount>,
}

#[derive(Debug, Deserialize)]
struct ProviderEmail {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct ProviderExternalAccount {
    #[serde(default)]
    image_url: Option<String>,
}

/// Acknowledgment body returned to the provider.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
    pub detail: String,
}

impl From<Outcome> for Ack {
    fn from(outcome: Outcome) -> Self {
        Self {
            ok: outcome.ok,
            detail: outcome.detail,
        }
    }
}

/// Probe response for delivery-endpoint configuration checks.
pub async fn probe() -> &'static str {
    "Webhook endpoint is up; expects POST deliveries"
}

/// Receive one provider delivery.
#[instrument(skip_all, fields(kind = %event.kind))]
pub async fn receive(
    State(state): State<AppState>,
    Json(event): Json<ProviderEvent>,
) -> (StatusCode, Json<Ack>) {
    let lifecycle = match map_event(event) {
        Ok(lifecycle) => lifecycle,
        Err(detail) => {
            tracing::warn!(detail = %detail, "rejecting malformed provider event");
            return (
                StatusCode::BAD_REQUEST,
                Json(Ack { ok: false, detail }),
            );
        }
    };

    let outcome = state.reconciler().handle(lifecycle).await;
    let status = if outcome.ok {
        StatusCode::OK
    } else {
        // Retryable: the provider's at-least-once redelivery finishes the
        // remaining work.
        StatusCode::BAD_GATEWAY
    };
    (status, Json(Ack::from(outcome)))
}

/// Map the provider wire format to a typed lifecycle event.
fn map_event(event: ProviderEvent) -> Result<LifecycleEvent, String> {
    let ProviderEvent { kind, data } = event;

    if kind == KIND_CREATED {
        let data = parse_user_data(data)?;
        let external_id = parse_external_id(&data.id)?;
        let email = primary_email(&data)
            .map_err(|e| format!("invalid email: {e}"))?
            .ok_or_else(|| "created event carries no email address".to_owned())?;
        let image_url = profile_image(&data);

        Ok(LifecycleEvent::Created(CreatedUser {
            external_id,
            email,
            first_name: non_empty(data.first_name),
            last_name: non_empty(data.last_name),
            image_url,
        }))
    } else if kind == KIND_UPDATED {
        let data = parse_user_data(data)?;
        let external_id = parse_external_id(&data.id)?;
        let email = primary_email(&data).map_err(|e| format!("invalid email: {e}"))?;
        let image_url = profile_image(&data);

        Ok(LifecycleEvent::Updated(UpdatedUser {
            external_id,
            email,
            first_name: non_empty(data.first_name),
            last_name: non_empty(data.last_name),
            image_url,
        }))
    } else if kind == KIND_DELETED {
        // Deleted payloads are skeletal: only the id is reliable.
        let data = parse_user_data(data)?;
        Ok(LifecycleEvent::Deleted {
            external_id: parse_external_id(&data.id)?,
        })
    } else {
        Ok(LifecycleEvent::Unsupported { kind })
    }
}

fn primary_email(data: &ProviderUserData) -> Result<Option<Email>, wheelhouse_core::EmailError> {
    data.email_addresses
        .first()
        .map(|e| Email::parse(&e.email_address))
        .transpose()
}

fn parse_user_data(data: serde_json::Value) -> Result<ProviderUserData, String> {
    serde_json::from_value(data).map_err(|e| format!("malformed user payload: {e}"))
}

fn parse_external_id(id: &str) -> Result<ExternalId, String> {
    ExternalId::parse(id).map_err(|e| format!("invalid external id: {e}"))
}

/// Profile image precedence: the dedicated profile image, then the generic
/// one, then whatever an external account brought along.
fn profile_image(data: &ProviderUserData) -> Option<String> {
    non_empty(data.profile_image_url.clone())
        .or_else(|| non_empty(data.image_url.clone()))
        .or_else(|| {
            data.external_accounts
                .iter()
                .find_map(|account| non_empty(account.image_url.clone()))
        })
}

/// The wire format cannot distinguish "cleared" from "not supplied"; treat
/// empty strings as absent so they never overwrite a stored value.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn provider_event(kind: &str, data: serde_json::Value) -> ProviderEvent {
        ProviderEvent {
            kind: kind.to_owned(),
            data,
        }
    }

    #[test]
    fn test_map_created() {
        let event = provider_event(
            "user.created",
            json!({
                "id": "user_2xKq9fLm",
                "first_name": "Jane",
                "last_name": "Doe",
                "email_addresses": [{"email_address": "jane@example.com"}],
                "image_url": "https://img.example/jane.png",
            }),
        );

        let LifecycleEvent::Created(user) = map_event(event).unwrap() else {
            panic!("expected created event");
        };
        assert_eq!(user.external_id.as_str(), "user_2xKq9fLm");
        assert_eq!(user.email.as_str(), "jane@example.com");
        assert_eq!(user.first_name.as_deref(), Some("Jane"));
        assert_eq!(user.image_url.as_deref(), Some("https://img.example/jane.png"));
    }

    #[test]
    fn test_map_created_without_email_is_rejected() {
        let event = provider_event(
            "user.created",
            json!({"id": "user_1", "email_addresses": []}),
        );
        assert!(map_event(event).is_err());
    }

    #[test]
    fn test_profile_image_precedence() {
        let event = provider_event(
            "user.created",
            json!({
                "id": "user_1",
                "email_addresses": [{"email_address": "a@x.com"}],
                "image_url": "https://img.example/generic.png",
                "profile_image_url": "https://img.example/profile.png",
                "external_accounts": [{"image_url": "https://img.example/oauth.png"}],
            }),
        );

        let LifecycleEvent::Created(user) = map_event(event).unwrap() else {
            panic!("expected created event");
        };
        assert_eq!(
            user.image_url.as_deref(),
            Some("https://img.example/profile.png")
        );
    }

    #[test]
    fn test_profile_image_falls_back_to_external_account() {
        let event = provider_event(
            "user.created",
            json!({
                "id": "user_1",
                "email_addresses": [{"email_address": "a@x.com"}],
                "image_url": "",
                "external_accounts": [{"image_url": "https://img.example/oauth.png"}],
            }),
        );

        let LifecycleEvent::Created(user) = map_event(event).unwrap() else {
            panic!("expected created event");
        };
        assert_eq!(
            user.image_url.as_deref(),
            Some("https://img.example/oauth.png")
        );
    }

    #[test]
    fn test_empty_strings_are_treated_as_absent() {
        let event = provider_event(
            "user.updated",
            json!({
                "id": "user_1",
                "first_name": "",
                "last_name": "Doe",
            }),
        );

        let LifecycleEvent::Updated(user) = map_event(event).unwrap() else {
            panic!("expected updated event");
        };
        assert_eq!(user.first_name, None);
        assert_eq!(user.last_name.as_deref(), Some("Doe"));
        assert_eq!(user.email, None);
    }

    #[test]
    fn test_map_deleted_with_skeletal_payload() {
        let event = provider_event("user.deleted", json!({"id": "user_9", "deleted": true}));

        let LifecycleEvent::Deleted { external_id } = map_event(event).unwrap() else {
            panic!("expected deleted event");
        };
        assert_eq!(external_id.as_str(), "user_9");
    }

    #[test]
    fn test_unknown_kind_maps_to_unsupported() {
        let event = provider_event("session.created", json!({"whatever": true}));

        let LifecycleEvent::Unsupported { kind } = map_event(event).unwrap() else {
            panic!("expected unsupported event");
        };
        assert_eq!(kind, "session.created");
    }
}
