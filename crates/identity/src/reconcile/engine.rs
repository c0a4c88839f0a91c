//! The reconciliation engine: one entry point per provider delivery.

use tracing::instrument;

use wheelhouse_core::ExternalId;

use crate::db::RepositoryError;
use crate::models::{NewUser, ProfileOverrides, ProfilePatch};

use super::cascade;
use super::event::{CreatedUser, LifecycleEvent, Outcome, UpdatedUser};
use super::{Directory, ReferenceGraph};

/// Handles verified lifecycle events against an injected directory and
/// reference graph.
///
/// Every handler is idempotent and safe under concurrent redelivery; see the
/// module docs for the consistency model.
pub struct Reconciler<D, G> {
    directory: D,
    graph: G,
}

impl<D: Directory, G: ReferenceGraph> Reconciler<D, G> {
    /// Create an engine over the given stores.
    pub const fn new(directory: D, graph: G) -> Self {
        Self { directory, graph }
    }

    /// Process one event and produce the acknowledgment outcome.
    ///
    /// Store-level failures never escape: they become retryable outcomes so
    /// the provider's at-least-once redelivery converges the system.
    #[instrument(skip_all, fields(kind = event.kind()))]
    pub async fn handle(&self, event: LifecycleEvent) -> Outcome {
        let result = match event {
            LifecycleEvent::Created(user) => self.created(user).await,
            LifecycleEvent::Updated(user) => self.updated(user).await,
            LifecycleEvent::Deleted { external_id } => self.deleted(&external_id).await,
            LifecycleEvent::Unsupported { kind } => {
                tracing::debug!(kind = %kind, "ignoring unsupported provider event kind");
                Ok(Outcome::success(format!("ignored event kind {kind}")))
            }
        };

        match result {
            Ok(outcome) => {
                if !outcome.ok {
                    tracing::warn!(detail = %outcome.detail, "event not fully processed, requesting redelivery");
                }
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, "store failure while processing event");
                Outcome::retry(format!("store failure: {e}"))
            }
        }
    }

    /// Created: plain insert, or collision resolution when the email is
    /// already taken.
    async fn created(&self, user: CreatedUser) -> Result<Outcome, RepositoryError> {
        let fresh = NewUser {
            external_id: user.external_id.clone(),
            email: Some(user.email.clone()),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image_url: user.image_url.clone(),
        };

        match self.directory.insert(fresh).await {
            Ok(record) => {
                tracing::info!(external_id = %record.external_id, "user created");
                Ok(Outcome::success("user created"))
            }
            Err(RepositoryError::Conflict(_)) => self.resolve_collision(user).await,
            Err(e) => Err(e),
        }
    }

    /// The insert conflicted. Either this is a redelivery of a `Created` we
    /// already processed (external id taken), or the email belongs to a
    /// record under a different external id and the account was recreated at
    /// the provider: re-key the surviving record instead of losing its
    /// listings, reviews and payments.
    ///
    /// The reference rewrite runs before the directory rekey. Until the
    /// cascade fully completes, the email still resolves to the old id, so a
    /// redelivery re-enters this path, finds the old record, and re-runs the
    /// remaining (idempotent) steps. Re-keying first would discard the old
    /// id and strand any rows a failed step left behind.
    async fn resolve_collision(&self, user: CreatedUser) -> Result<Outcome, RepositoryError> {
        if self
            .directory
            .find_by_external_id(&user.external_id)
            .await?
            .is_some()
        {
            return Ok(Outcome::success("user already exists"));
        }

        let Some(existing) = self.directory.find_by_email(&user.email).await? else {
            // The conflicting row vanished between insert and lookup.
            // Redelivery will retry the plain insert.
            return Ok(Outcome::retry(
                "duplicate email reported but no existing record found",
            ));
        };
        let old = existing.external_id.clone();

        let report = cascade::rewrite_references(&self.graph, &old, &user.external_id).await;
        if !report.is_complete() {
            return Ok(Outcome::retry(format!(
                "re-key cascade incomplete: {}",
                report.failed_fields()
            )));
        }

        let overrides = ProfileOverrides {
            first_name: user.first_name,
            last_name: user.last_name,
            image_url: user.image_url,
        };
        match self
            .directory
            .rekey(&old, &user.external_id, overrides)
            .await
        {
            Ok(record) => {
                tracing::info!(
                    old = %old,
                    new = %record.external_id,
                    rows = report.rows_touched(),
                    "identity re-keyed"
                );
                Ok(Outcome::success("identity re-keyed"))
            }
            // Lost a race with a concurrent redelivery that finished the
            // rekey; the end state is the one we wanted.
            Err(RepositoryError::NotFound) => Ok(Outcome::success("identity already re-keyed")),
            Err(e) => Err(e),
        }
    }

    /// Updated: patch in place, or synthesize the record when the `Created`
    /// event has not been durably processed yet.
    async fn updated(&self, user: UpdatedUser) -> Result<Outcome, RepositoryError> {
        let patch = ProfilePatch {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image_url: user.image_url.clone(),
        };

        match self.directory.update_profile(&user.external_id, patch).await {
            Ok(record) => {
                tracing::info!(external_id = %record.external_id, "profile updated");
                Ok(Outcome::success("profile updated"))
            }
            Err(RepositoryError::NotFound) => {
                let synthesized = NewUser {
                    external_id: user.external_id.clone(),
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    image_url: user.image_url,
                };
                match self.directory.insert(synthesized).await {
                    Ok(record) => {
                        tracing::info!(
                            external_id = %record.external_id,
                            "record synthesized from update delivered before create"
                        );
                        Ok(Outcome::success("record synthesized from update"))
                    }
                    // The record appeared (or its email got taken) between
                    // the lookup and the insert; redelivery lands on the
                    // update path.
                    Err(RepositoryError::Conflict(c)) => Ok(Outcome::retry(format!(
                        "conflict while synthesizing record: {c}"
                    ))),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Deleted: cascade over every referencing collection, then remove the
    /// directory record. The record is deleted only after a fully successful
    /// cascade so a crash or partial failure leaves references whose owner
    /// still exists (recoverable by redelivery), never rows with no
    /// possible owner.
    async fn deleted(&self, external_id: &ExternalId) -> Result<Outcome, RepositoryError> {
        if self
            .directory
            .find_by_external_id(external_id)
            .await?
            .is_none()
        {
            return Ok(Outcome::success("user already deleted"));
        }

        let report = cascade::delete_references(&self.graph, external_id).await;
        if !report.is_complete() {
            return Ok(Outcome::retry(format!(
                "delete cascade incomplete: {}",
                report.failed_fields()
            )));
        }

        match self.directory.delete(external_id).await {
            Ok(record) => {
                tracing::info!(
                    external_id = %record.external_id,
                    rows = report.rows_touched(),
                    "user and references deleted"
                );
                Ok(Outcome::success("user deleted"))
            }
            // A concurrent redelivery got there first.
            Err(RepositoryError::NotFound) => Ok(Outcome::success("user already deleted")),
            Err(e) => Err(e),
        }
    }
}
