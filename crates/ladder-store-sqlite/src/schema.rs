//! SQL schema for the leaderboard SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per committed ingestion. Never updated after its run.
CREATE TABLE IF NOT EXISTS fetches (
    id            INTEGER PRIMARY KEY,
    success       BOOLEAN NOT NULL,
    error         TEXT,
    cache_status  TEXT,
    cached_at     INTEGER,     -- epoch millis
    cached_until  INTEGER      -- epoch millis; gates the next fetch
);

-- Deduplicated identities; mutable columns are last-write-wins.
CREATE TABLE IF NOT EXISTS users (
    id           INTEGER PRIMARY KEY,
    upstream_id  BLOB NOT NULL UNIQUE,
    role         TEXT,
    bestrank     TEXT,
    supporter    BOOLEAN,
    verified     BOOLEAN
);

-- Strictly append-only: one row per user per fetch.
CREATE TABLE IF NOT EXISTS stats (
    id           INTEGER PRIMARY KEY,
    fetch_id     INTEGER NOT NULL REFERENCES fetches(id),
    user_id      INTEGER NOT NULL REFERENCES users(id),
    username     TEXT,
    country      TEXT,
    rank         TEXT,
    decaying     BOOLEAN,
    xp           REAL,
    gamesplayed  INTEGER,
    gameswon     INTEGER,
    rating       REAL,
    glicko       REAL,
    rd           REAL,
    apm          REAL,
    pps          REAL,
    vs           REAL
);

CREATE INDEX IF NOT EXISTS stats_user_idx  ON stats(user_id);
CREATE INDEX IF NOT EXISTS stats_fetch_idx ON stats(fetch_id);

PRAGMA user_version = 1;
";
