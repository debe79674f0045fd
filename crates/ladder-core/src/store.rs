//! The `LeaderboardStore` trait.
//!
//! Implemented by storage backends (e.g. `ladder-store-sqlite`). The
//! ingestion driver depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
  fetch::{Envelope, FetchRun},
  user::{HistoryEntry, NormalizedRecord, UpstreamId, User},
};

// ─── Ingest result ───────────────────────────────────────────────────────────

/// What a committed ingestion wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
  pub fetch: FetchRun,
  pub stats: usize,
}

/// Result of [`LeaderboardStore::ingest`].
#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
  Committed(IngestSummary),
  /// Another run committed a still-valid cache window first; nothing was
  /// written.
  RateLimited { wait: TimeDelta },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the persistence layer.
///
/// Identity rows are upserted, history rows and fetch runs are append-only.
pub trait LeaderboardStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The most recent fetch run, if any.
  fn last_fetch(
    &self,
  ) -> impl Future<Output = Result<Option<FetchRun>, Self::Error>> + Send + '_;

  /// Record a fetch run and every record of its payload atomically.
  ///
  /// The gate is re-evaluated at `now` against the last committed run inside
  /// the same exclusive transaction. The first `Err` yielded by `records`
  /// aborts the whole ingestion, as does any write failure: either the fetch
  /// run and all of its history rows are committed, or nothing is.
  fn ingest<I>(
    &self,
    envelope: Envelope,
    records: I,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Ingest, Self::Error>> + Send + '_
  where
    I: Iterator<Item = crate::Result<NormalizedRecord>> + Send + 'static;

  /// Look up the identity row for `upstream_id`.
  fn get_user(
    &self,
    upstream_id: UpstreamId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// All history rows for a user, oldest fetch first.
  fn history(
    &self,
    upstream_id: UpstreamId,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + '_;

  /// The most recent `limit` fetch runs, newest first.
  fn list_fetches(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<FetchRun>, Self::Error>> + Send + '_;
}
