//! [`SqliteStore`] — the SQLite implementation of [`LeaderboardStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use ladder_core::{
  fetch::{Envelope, FetchRun},
  gate::{Gate, should_proceed},
  store::{Ingest, IngestSummary, LeaderboardStore},
  user::{HistoryEntry, NormalizedRecord, UpstreamId, User},
};

use crate::{
  Error, Result,
  encode::{
    FETCH_COLUMNS, USER_COLUMNS, fetch_from_row, history_from_row, insert_fetch,
    insert_stat, last_cached_until, upsert_user, user_from_row,
  },
  schema::SCHEMA,
};

/// How often ingest progress is logged, in records.
const PROGRESS_EVERY: usize = 10_000;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A leaderboard store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Row counts of `(fetches, users, stats)`.
  pub async fn counts(&self) -> Result<(i64, i64, i64)> {
    Ok(
      self
        .conn
        .call(|conn| {
          Ok(conn.query_row(
            "SELECT (SELECT COUNT(*) FROM fetches),
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM stats)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )?)
        })
        .await?,
    )
  }
}

// ─── LeaderboardStore impl ───────────────────────────────────────────────────

impl LeaderboardStore for SqliteStore {
  type Error = Error;

  async fn last_fetch(&self) -> Result<Option<FetchRun>> {
    Ok(
      self
        .conn
        .call(|conn| {
          Ok(
            conn
              .query_row(
                &format!("SELECT {FETCH_COLUMNS} FROM fetches ORDER BY id DESC LIMIT 1"),
                [],
                fetch_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn ingest<I>(
    &self,
    envelope: Envelope,
    records: I,
    now: DateTime<Utc>,
  ) -> Result<Ingest>
  where
    I: Iterator<Item = ladder_core::Result<NormalizedRecord>> + Send + 'static,
  {
    let outcome: Result<Ingest> = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front, so the gate below sees the
        // last committed run and no other writer can slip in after it.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Gate::Wait(wait) = should_proceed(now, last_cached_until(&tx)?.flatten()) {
          return Ok(Ok(Ingest::RateLimited { wait }));
        }

        let fetch_id = insert_fetch(&tx, &envelope)?;
        tracing::debug!(fetch_id, success = envelope.success, "fetch run opened");

        let mut stats = 0usize;
        for record in records {
          // Returning early drops `tx`, which rolls the whole run back.
          let record = match record {
            Ok(record) => record,
            Err(e) => return Ok(Err(Error::Record(e))),
          };
          let stat = record.for_fetch(fetch_id);

          upsert_user(&tx, &stat.record.identity)?;
          if insert_stat(&tx, &stat)? == 0 {
            return Ok(Err(Error::UnresolvedUser(stat.record.identity.upstream_id)));
          }

          stats += 1;
          if stats % PROGRESS_EVERY == 0 {
            tracing::debug!(fetch_id, stats, "ingesting");
          }
        }

        let fetch = tx.query_row(
          &format!("SELECT {FETCH_COLUMNS} FROM fetches WHERE id = ?1"),
          rusqlite::params![fetch_id],
          fetch_from_row,
        )?;
        tx.commit()?;

        Ok(Ok(Ingest::Committed(IngestSummary { fetch, stats })))
      })
      .await?;

    outcome
  }

  async fn get_user(&self, upstream_id: UpstreamId) -> Result<Option<User>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE upstream_id = ?1"),
                rusqlite::params![upstream_id.as_bytes()],
                user_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn history(&self, upstream_id: UpstreamId) -> Result<Vec<HistoryEntry>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(
            "SELECT
               s.id, s.fetch_id, s.user_id,
               s.username, s.country, s.rank, s.decaying, s.xp,
               s.gamesplayed, s.gameswon, s.rating, s.glicko, s.rd,
               s.apm, s.pps, s.vs,
               f.cached_at
             FROM stats s
             JOIN users   u ON u.id = s.user_id
             JOIN fetches f ON f.id = s.fetch_id
             WHERE u.upstream_id = ?1
             ORDER BY s.fetch_id",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![upstream_id.as_bytes()], history_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn list_fetches(&self, limit: usize) -> Result<Vec<FetchRun>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&format!(
            "SELECT {FETCH_COLUMNS} FROM fetches ORDER BY id DESC LIMIT ?1"
          ))?;
          let rows = stmt
            .query_map(rusqlite::params![limit], fetch_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }
}
