//! Error type for `ladder-store-sqlite`.

use ladder_core::user::UpstreamId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A record failed to extract or merge mid-ingest; the run was rolled back.
  #[error("record rejected: {0}")]
  Record(#[from] ladder_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The history insert found no identity row to attach to.
  #[error("no user row for upstream id {0}")]
  UnresolvedUser(UpstreamId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
