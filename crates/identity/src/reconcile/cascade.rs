//! Cascade orchestration over the reference graph.
//!
//! A cascade runs one bulk operation per (collection, field) pair in
//! [`REFERENCE_GRAPH`]. Steps are independent: they fan out concurrently,
//! a failing step never aborts its siblings, and every outcome is collected
//! into a [`CascadeReport`]. The caller decides what partial completion
//! means (a re-key withholds the directory rekey, a delete withholds the
//! root-row delete) and surfaces a retryable failure so the provider's
//! redelivery finishes the remaining steps.

use futures::future::join_all;
use thiserror::Error;

use wheelhouse_core::ExternalId;

use super::graph::{REFERENCE_GRAPH, ReferenceField};
use super::ReferenceGraph;

/// Failure of a single cascade step.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StepError(pub String);

impl From<sqlx::Error> for StepError {
    fn from(e: sqlx::Error) -> Self {
        Self(e.to_string())
    }
}

/// A step that completed, with the number of rows it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub field: ReferenceField,
    pub rows: u64,
}

/// A step that did not complete.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub field: ReferenceField,
    pub cause: String,
}

/// Aggregated outcome of one cascade pass over the full reference graph.
#[derive(Debug, Clone, Default)]
pub struct CascadeReport {
    pub succeeded: Vec<StepReport>,
    pub failed: Vec<StepFailure>,
}

impl CascadeReport {
    /// `true` when every step completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total rows rewritten or deleted by the completed steps.
    #[must_use]
    pub fn rows_touched(&self) -> u64 {
        self.succeeded.iter().map(|s| s.rows).sum()
    }

    /// Comma-separated `collection.field` list of the failed steps, for
    /// surfacing in a retryable acknowledgment.
    #[must_use]
    pub fn failed_fields(&self) -> String {
        self.failed
            .iter()
            .map(|f| f.field.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn collect(results: Vec<(ReferenceField, Result<u64, StepError>)>) -> Self {
        let mut report = Self::default();
        for (field, result) in results {
            match result {
                Ok(rows) => report.succeeded.push(StepReport { field, rows }),
                Err(e) => {
                    tracing::warn!(step = %field, error = %e, "cascade step failed");
                    report.failed.push(StepFailure {
                        field,
                        cause: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

/// Rewrite every reference from `old` to `new` across the graph.
pub async fn rewrite_references<G: ReferenceGraph + ?Sized>(
    graph: &G,
    old: &ExternalId,
    new: &ExternalId,
) -> CascadeReport {
    let steps = REFERENCE_GRAPH.iter().map(|&field| async move {
        (field, graph.rewrite_foreign_key(field, old, new).await)
    });
    CascadeReport::collect(join_all(steps).await)
}

/// Delete every row referencing `key` across the graph.
pub async fn delete_references<G: ReferenceGraph + ?Sized>(
    graph: &G,
    key: &ExternalId,
) -> CascadeReport {
    let steps = REFERENCE_GRAPH
        .iter()
        .map(|&field| async move { (field, graph.delete_by_foreign_key(field, key).await) });
    CascadeReport::collect(join_all(steps).await)
}
