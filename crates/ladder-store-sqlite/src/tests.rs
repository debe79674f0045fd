//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Utc};
use ladder_core::{
  Error as CoreError,
  fetch::{CacheWindow, Envelope},
  store::{Ingest, IngestSummary, LeaderboardStore},
  user::{NormalizedRecord, RawUser, UpstreamId, merge},
};
use serde_json::{Value, json};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(millis: i64) -> DateTime<Utc> {
  DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
}

fn envelope(cached_at: i64, cached_until: i64) -> Envelope {
  Envelope {
    success: true,
    error:   None,
    cache:   Some(CacheWindow {
      status:       Some("hit".into()),
      cached_at:    Some(cached_at),
      cached_until: Some(cached_until),
    }),
  }
}

fn user_json(id: &str, role: &str, rating: f64) -> Value {
  json!({
    "_id": id,
    "username": format!("user-{id}"),
    "role": role,
    "xp": 1.0,
    "supporter": false,
    "verified": true,
    "country": "NL",
    "league": {
      "rank": "s",
      "bestrank": "s+",
      "gamesplayed": 1,
      "gameswon": 1,
      "rating": rating,
      "glicko": 2000.0,
      "rd": 60.0,
      "apm": 70.0,
      "pps": 1.5,
      "vs": 150.0,
      "decaying": false
    }
  })
}

fn record(id: &str, role: &str, rating: f64) -> NormalizedRecord {
  let raw: RawUser = serde_json::from_value(user_json(id, role, rating)).unwrap();
  merge(raw).unwrap()
}

fn ok(records: Vec<NormalizedRecord>) -> impl Iterator<Item = ladder_core::Result<NormalizedRecord>> {
  records.into_iter().map(Ok)
}

fn committed(outcome: Ingest) -> IngestSummary {
  match outcome {
    Ingest::Committed(summary) => summary,
    other => panic!("expected a committed ingest, got {other:?}"),
  }
}

// ─── Scenario ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_user_payload() {
  let s = store().await;

  let summary = committed(
    s.ingest(envelope(1000, 2000), ok(vec![record("aabbccdd", "user", 1.0)]), at(500))
      .await
      .unwrap(),
  );
  assert_eq!(summary.stats, 1);
  assert!(summary.fetch.success);
  assert_eq!(summary.fetch.cached_until(), Some(2000));
  assert_eq!(s.counts().await.unwrap(), (1, 1, 1));

  let id = UpstreamId::from_hex("aabbccdd").unwrap();
  let user = s.get_user(id.clone()).await.unwrap().unwrap();
  assert_eq!(user.identity.upstream_id.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD]);

  let history = s.history(id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].stat.fetch_id, summary.fetch.id);
  assert_eq!(history[0].stat.user_id, user.id);
  assert_eq!(history[0].cached_at, Some(1000));
  assert_eq!(history[0].stat.snapshot.country.as_deref(), Some("NL"));
}

#[tokio::test]
async fn last_fetch_is_the_newest_run() {
  let s = store().await;
  assert!(s.last_fetch().await.unwrap().is_none());

  s.ingest(envelope(1000, 2000), ok(vec![]), at(0)).await.unwrap();
  s.ingest(envelope(3000, 4000), ok(vec![]), at(2500)).await.unwrap();

  let last = s.last_fetch().await.unwrap().unwrap();
  assert_eq!(last.cached_until(), Some(4000));
}

// ─── Identity upsert ─────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_across_runs_keeps_one_user() {
  let s = store().await;

  s.ingest(envelope(0, 1000), ok(vec![record("aa", "user", 1.0)]), at(0))
    .await
    .unwrap();
  s.ingest(envelope(1000, 2000), ok(vec![record("aa", "mod", 2.0)]), at(1500))
    .await
    .unwrap();

  assert_eq!(s.counts().await.unwrap(), (2, 1, 2));
  let user = s
    .get_user(UpstreamId::from_hex("aa").unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(user.identity.role.as_deref(), Some("mod"));
}

#[tokio::test]
async fn duplicate_within_one_run_upserts() {
  let s = store().await;

  let summary = committed(
    s.ingest(
      envelope(0, 1000),
      ok(vec![record("aa", "user", 1.0), record("aa", "admin", 1.0)]),
      at(0),
    )
    .await
    .unwrap(),
  );

  assert_eq!(summary.stats, 2);
  assert_eq!(s.counts().await.unwrap(), (1, 1, 2));
  let user = s
    .get_user(UpstreamId::from_hex("aa").unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(user.identity.role.as_deref(), Some("admin"));
}

#[tokio::test]
async fn get_user_missing_returns_none() {
  let s = store().await;
  let user = s.get_user(UpstreamId::from_hex("ff").unwrap()).await.unwrap();
  assert!(user.is_none());
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_appends_one_row_per_run() {
  let s = store().await;

  for run in 0..3 {
    let start = run * 1000;
    s.ingest(
      envelope(start, start + 1000),
      ok(vec![record("aa", "user", run as f64)]),
      at(start + 1),
    )
    .await
    .unwrap();
  }

  let history = s.history(UpstreamId::from_hex("aa").unwrap()).await.unwrap();
  assert_eq!(history.len(), 3);
  let fetch_ids: Vec<_> = history.iter().map(|h| h.stat.fetch_id).collect();
  assert!(fetch_ids.windows(2).all(|w| w[0] < w[1]));
  let ratings: Vec<_> = history.iter().map(|h| h.stat.snapshot.rating).collect();
  assert_eq!(ratings, [Some(0.0), Some(1.0), Some(2.0)]);
}

#[tokio::test]
async fn list_fetches_newest_first() {
  let s = store().await;
  for run in 0..3 {
    let start = run * 1000;
    s.ingest(envelope(start, start + 1000), ok(vec![]), at(start + 1))
      .await
      .unwrap();
  }

  let fetches = s.list_fetches(2).await.unwrap();
  assert_eq!(fetches.len(), 2);
  assert!(fetches[0].id > fetches[1].id);
  assert_eq!(fetches[0].cached_until(), Some(3000));
}

// ─── Envelope handling ───────────────────────────────────────────────────────

#[tokio::test]
async fn unsuccessful_run_still_ingests_records() {
  let s = store().await;
  let env = Envelope {
    success: false,
    error:   Some("partial outage".into()),
    cache:   None,
  };

  let summary = committed(
    s.ingest(env, ok(vec![record("aa", "user", 1.0)]), at(0))
      .await
      .unwrap(),
  );

  assert!(!summary.fetch.success);
  assert_eq!(summary.fetch.error.as_deref(), Some("partial outage"));
  assert_eq!(summary.fetch.cache, CacheWindow::default());
  assert_eq!(summary.stats, 1);
}

#[tokio::test]
async fn empty_record_stream_records_the_run() {
  let s = store().await;
  let summary = committed(s.ingest(envelope(0, 1000), ok(vec![]), at(0)).await.unwrap());
  assert_eq!(summary.stats, 0);
  assert_eq!(s.counts().await.unwrap(), (1, 0, 0));
}

#[tokio::test]
async fn run_without_cache_window_never_gates() {
  let s = store().await;
  let env = Envelope { success: true, error: None, cache: None };
  s.ingest(env.clone(), ok(vec![]), at(0)).await.unwrap();
  committed(s.ingest(env, ok(vec![]), at(0)).await.unwrap());
  assert_eq!(s.counts().await.unwrap(), (2, 0, 0));
}

// ─── Atomicity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_record_rolls_back_the_whole_run() {
  const N: usize = 4;

  for k in 0..N {
    let s = store().await;
    let records: Vec<ladder_core::Result<NormalizedRecord>> = (0..N)
      .map(|i| {
        if i == k {
          Err(CoreError::MissingField("league.rank".into()))
        } else {
          Ok(record(&format!("{i:02x}"), "user", 1.0))
        }
      })
      .collect();

    let err = s
      .ingest(envelope(0, 1000), records.into_iter(), at(0))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Record(CoreError::MissingField(_))));
    assert_eq!(s.counts().await.unwrap(), (0, 0, 0), "record #{k}");
  }
}

#[tokio::test]
async fn failed_run_does_not_block_the_next() {
  let s = store().await;
  let bad: Vec<ladder_core::Result<NormalizedRecord>> =
    vec![Err(CoreError::InvalidIdentity("zz".into()))];
  s.ingest(envelope(0, 5000), bad.into_iter(), at(0))
    .await
    .unwrap_err();

  // The rolled-back run left no cache window behind.
  committed(s.ingest(envelope(0, 5000), ok(vec![]), at(1)).await.unwrap());
}

// ─── Gate re-check ───────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_rechecks_the_gate() {
  let s = store().await;
  s.ingest(envelope(1000, 2000), ok(vec![record("aa", "user", 1.0)]), at(500))
    .await
    .unwrap();

  let outcome = s
    .ingest(envelope(1000, 2000), ok(vec![record("aa", "user", 1.0)]), at(1500))
    .await
    .unwrap();

  match outcome {
    Ingest::RateLimited { wait } => assert_eq!(wait.num_milliseconds(), 500),
    other => panic!("expected rate limiting, got {other:?}"),
  }
  assert_eq!(s.counts().await.unwrap(), (1, 1, 1));
}
