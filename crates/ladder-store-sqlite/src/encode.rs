//! Mapping between domain types and SQLite rows.
//!
//! Column lists are kept next to the row readers that depend on their order.
//! Booleans are stored as 0/1 integers, identities as raw BLOBs.

use ladder_core::{
  fetch::{CacheWindow, Envelope, FetchRun},
  user::{HistoryEntry, Identity, Snapshot, Stat, StatRecord, UpstreamId, User},
};
use rusqlite::{OptionalExtension as _, Row, Transaction, params};

// ─── fetches ─────────────────────────────────────────────────────────────────

pub const FETCH_COLUMNS: &str =
  "id, success, error, cache_status, cached_at, cached_until";

pub fn fetch_from_row(row: &Row<'_>) -> rusqlite::Result<FetchRun> {
  Ok(FetchRun {
    id:      row.get(0)?,
    success: row.get(1)?,
    error:   row.get(2)?,
    cache:   CacheWindow {
      status:       row.get(3)?,
      cached_at:    row.get(4)?,
      cached_until: row.get(5)?,
    },
  })
}

/// Create the fetch run row, then patch in the optional envelope fields.
pub fn insert_fetch(tx: &Transaction<'_>, envelope: &Envelope) -> rusqlite::Result<i64> {
  tx.execute("INSERT INTO fetches (success) VALUES (?1)", params![envelope.success])?;
  let fetch_id = tx.last_insert_rowid();

  if let Some(error) = &envelope.error {
    tx.execute(
      "UPDATE fetches SET error = ?1 WHERE id = ?2",
      params![error, fetch_id],
    )?;
  }

  if let Some(cache) = &envelope.cache {
    tx.execute(
      "UPDATE fetches SET cache_status = ?1, cached_at = ?2, cached_until = ?3
       WHERE id = ?4",
      params![cache.status, cache.cached_at, cache.cached_until, fetch_id],
    )?;
  }

  Ok(fetch_id)
}

/// `cached_until` of the newest fetch run; `None` when there is no run.
pub fn last_cached_until(tx: &Transaction<'_>) -> rusqlite::Result<Option<Option<i64>>> {
  tx.query_row(
    "SELECT cached_until FROM fetches ORDER BY id DESC LIMIT 1",
    [],
    |row| row.get(0),
  )
  .optional()
}

// ─── users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "id, upstream_id, role, bestrank, supporter, verified";

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:       row.get(0)?,
    identity: Identity {
      upstream_id: UpstreamId::from_bytes(row.get(1)?),
      role:        row.get(2)?,
      bestrank:    row.get(3)?,
      supporter:   row.get(4)?,
      verified:    row.get(5)?,
    },
  })
}

/// Insert a new identity or overwrite the mutable columns of an existing one.
pub fn upsert_user(tx: &Transaction<'_>, identity: &Identity) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare_cached(
    "INSERT INTO users (upstream_id, role, bestrank, supporter, verified)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (upstream_id) DO UPDATE SET
       role      = excluded.role,
       bestrank  = excluded.bestrank,
       supporter = excluded.supporter,
       verified  = excluded.verified",
  )?;
  stmt.execute(params![
    identity.upstream_id.as_bytes(),
    identity.role,
    identity.bestrank,
    identity.supporter,
    identity.verified,
  ])?;
  Ok(())
}

// ─── stats ───────────────────────────────────────────────────────────────────

/// Append one history row, resolving `user_id` through the identity table.
/// Returns the number of rows written (0 if the identity is missing).
pub fn insert_stat(tx: &Transaction<'_>, stat: &StatRecord) -> rusqlite::Result<usize> {
  let snap = &stat.record.snapshot;
  let mut stmt = tx.prepare_cached(
    "INSERT INTO stats (
       fetch_id, user_id, username, country, rank, decaying,
       xp, gamesplayed, gameswon, rating, glicko, rd, apm, pps, vs
     )
     SELECT ?1, id, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14
     FROM users
     WHERE upstream_id = ?15",
  )?;
  stmt.execute(params![
    stat.fetch_id,
    snap.username,
    snap.country,
    snap.rank,
    snap.decaying,
    snap.xp,
    snap.gamesplayed,
    snap.gameswon,
    snap.rating,
    snap.glicko,
    snap.rd,
    snap.apm,
    snap.pps,
    snap.vs,
    stat.record.identity.upstream_id.as_bytes(),
  ])
}

/// Reads a history row joined with `fetches.cached_at`, selected as
/// `s.id, s.fetch_id, s.user_id, <snapshot columns>, f.cached_at`.
pub fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
  Ok(HistoryEntry {
    stat:      Stat {
      id:       row.get(0)?,
      fetch_id: row.get(1)?,
      user_id:  row.get(2)?,
      snapshot: Snapshot {
        username:    row.get(3)?,
        country:     row.get(4)?,
        rank:        row.get(5)?,
        decaying:    row.get(6)?,
        xp:          row.get(7)?,
        gamesplayed: row.get(8)?,
        gameswon:    row.get(9)?,
        rating:      row.get(10)?,
        glicko:      row.get(11)?,
        rd:          row.get(12)?,
        apm:         row.get(13)?,
        pps:         row.get(14)?,
        vs:          row.get(15)?,
      },
    },
    cached_at: row.get(16)?,
  })
}
