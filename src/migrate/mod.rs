//! Cross-source migration of a starred show's watch progress.
//!
//! A pass searches the candidate sources for the show's title, keeps the
//! closest title (ties go to the higher priority source), then lines up the
//! old play-line/episode with the target's play-lines. [`MigrationSession`]
//! drives the passes and publishes [`MigrationState`] to observers.

mod aggregate;
mod distance;
mod reconcile;
mod select;
mod session;


use thiserror::Error;

pub(crate) use aggregate::{AggregateOptions, aggregate};
pub(crate) use distance::distance;
pub(crate) use reconcile::reconcile;
pub(crate) use select::{MigrationCandidate, rank_candidates, select_best};
pub(crate) use session::{MigrationSession, MigrationState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum MigrateError {
    #[error("source {source_id} unavailable: {message}")]
    SourceUnavailable { source_id: String, message: String },
    #[error("no match for '{query}' on any candidate source")]
    NoMatchFound { query: String },
    #[error("could not load play lines from {source_id}: {message}")]
    PlayLineRetrievalFailed { source_id: String, message: String },
    #[error("migration pass was superseded")]
    Cancelled,
    #[error("no target show chosen yet")]
    NothingToConfirm,
    #[error("failed to save migrated show: {0}")]
    Storage(String),
}
