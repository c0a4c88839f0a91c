//! Lifecycle events and handling outcomes.
//!
//! Events arrive already verified: an upstream collaborator checks the
//! provider's signature before anything reaches the engine. The engine only
//! sees the typed forms below.

use wheelhouse_core::{Email, ExternalId};

/// A verified identity-provider lifecycle event.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// A user account was created at the provider.
    Created(CreatedUser),
    /// A user account's profile changed at the provider.
    Updated(UpdatedUser),
    /// A user account was deleted at the provider.
    Deleted {
        /// The deleted account's external id.
        external_id: ExternalId,
    },
    /// An event kind this service does not model; acknowledged as a no-op
    /// for forward compatibility with new provider event types.
    Unsupported {
        /// The provider's event type string.
        kind: String,
    },
}

impl LifecycleEvent {
    /// Short label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::Deleted { .. } => "deleted",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// Payload of a `Created` event. Email is always present; the rest of the
/// profile may not be.
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub external_id: ExternalId,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

/// Payload of an `Updated` event. Fields are present only if they changed.
#[derive(Debug, Clone)]
pub struct UpdatedUser {
    pub external_id: ExternalId,
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

/// Result of handling one event, surfaced to the provider's delivery
/// mechanism.
///
/// `ok` decides the acknowledgment: `true` maps to 2xx (durably processed,
/// including idempotent "already done"), `false` to a retryable non-2xx so
/// the provider redelivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub ok: bool,
    pub detail: String,
}

impl Outcome {
    /// Durably processed; acknowledge.
    #[must_use]
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    /// Not (fully) processed; request redelivery.
    #[must_use]
    pub fn retry(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}
