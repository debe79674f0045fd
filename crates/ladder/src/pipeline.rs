//! The ingestion driver.
//!
//! ```text
//! gate check ──deny──▶ RateLimited
//!     │
//!  download ─▶ envelope pass ──malformed──▶ abort (nothing written)
//!     │
//!  record pass ─▶ merge ─▶ upsert user + append stat   (one transaction)
//! ```

use chrono::{DateTime, Utc};
use ladder_core::{
  gate::{Gate, should_proceed},
  store::{Ingest, IngestSummary, LeaderboardStore},
  user::merge,
};
use ladder_extract::Spool;
use tracing::{info, warn};

use crate::{Error, Fetcher, Result};

/// One fetch-and-ingest cycle against an injected store.
pub struct Pipeline<S> {
  store:   S,
  fetcher: Fetcher,
}

impl<S: LeaderboardStore> Pipeline<S> {
  pub fn new(store: S, fetcher: Fetcher) -> Self { Self { store, fetcher } }

  pub fn store(&self) -> &S { &self.store }

  /// Gate, download and ingest. Returns what was committed.
  pub async fn run(&self) -> Result<IngestSummary> {
    self.check_gate(Utc::now()).await?;
    let spool = self.fetcher.download().await?;
    self.ingest(&spool, Utc::now()).await
  }

  /// Evaluate the gate against the last committed fetch run.
  pub async fn gate(&self, now: DateTime<Utc>) -> Result<Gate> {
    let last = self.store.last_fetch().await.map_err(store_error)?;
    Ok(should_proceed(now, last.and_then(|f| f.cached_until())))
  }

  async fn check_gate(&self, now: DateTime<Utc>) -> Result<()> {
    match self.gate(now).await? {
      Gate::Proceed => Ok(()),
      Gate::Wait(wait) => Err(Error::RateLimited { wait }),
    }
  }

  /// Extract `spool` and write it as one fetch run.
  ///
  /// The envelope pass runs to completion first, so a malformed document is
  /// rejected before anything touches the store. Records are then streamed
  /// straight into the store's transaction.
  pub async fn ingest(&self, spool: &Spool, now: DateTime<Utc>) -> Result<IngestSummary> {
    let envelope = spool.envelope()?;
    if !envelope.success {
      warn!(error = envelope.error.as_deref(), "upstream reported an unsuccessful snapshot");
    }
    info!(
      success = envelope.success,
      cached_until = envelope.cache.as_ref().and_then(|c| c.cached_until),
      "envelope extracted"
    );

    let records = spool
      .records()?
      .map(|raw| raw.map_err(ladder_core::Error::from).and_then(merge));

    match self
      .store
      .ingest(envelope, records, now)
      .await
      .map_err(store_error)?
    {
      Ingest::Committed(summary) => {
        info!(fetch_id = summary.fetch.id, stats = summary.stats, "fetch run committed");
        Ok(summary)
      }
      Ingest::RateLimited { wait } => Err(Error::RateLimited { wait }),
    }
  }
}

fn store_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use ladder_core::user::UpstreamId;
  use ladder_store_sqlite::SqliteStore;
  use serde_json::{Value, json};

  use super::*;
  use crate::Settings;

  async fn pipeline() -> Pipeline<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.expect("in-memory store");
    let fetcher = Fetcher::new(&Settings::default()).expect("http client");
    Pipeline::new(store, fetcher)
  }

  fn at(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
  }

  fn spool(doc: &str) -> Spool {
    let mut spool = Spool::new().unwrap();
    spool.write_all(doc.as_bytes()).unwrap();
    spool
  }

  fn user(id: &str) -> Value {
    json!({
      "_id": id,
      "username": "osk",
      "role": "user",
      "xp": 1.0,
      "supporter": false,
      "verified": false,
      "country": "SE",
      "league": {
        "rank": "s", "bestrank": "s", "gamesplayed": 1, "gameswon": 1,
        "rating": 1.0, "glicko": 1.0, "rd": 1.0, "apm": 1.0, "pps": 1.0,
        "vs": 1.0, "decaying": false
      }
    })
  }

  fn payload(users: Vec<Value>) -> String {
    json!({
      "success": true,
      "cache": { "status": "hit", "cached_at": 1000, "cached_until": 2000 },
      "data": { "users": { "item": users } }
    })
    .to_string()
  }

  async fn counts(p: &Pipeline<SqliteStore>) -> (i64, i64, i64) {
    p.store().counts().await.unwrap()
  }

  #[tokio::test]
  async fn ingests_scenario_payload() {
    let p = pipeline().await;

    let summary = p.ingest(&spool(&payload(vec![user("aabbccdd")])), at(500)).await.unwrap();
    assert!(summary.fetch.success);
    assert_eq!(summary.fetch.cached_until(), Some(2000));
    assert_eq!(summary.stats, 1);
    assert_eq!(counts(&p).await, (1, 1, 1));

    let id = UpstreamId::from_bytes(vec![0xAA, 0xBB, 0xCC, 0xDD]);
    assert!(p.store().get_user(id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn scenario_document_end_to_end() {
    let p = pipeline().await;
    let doc = r#"{
      "success": true,
      "cache": { "status": "hit", "cached_at": 1000, "cached_until": 2000 },
      "data": {
        "users": {
          "item": [
            {
              "_id": "aabbccdd",
              "username": "osk",
              "role": "user",
              "xp": 1.0,
              "supporter": false,
              "verified": false,
              "country": "SE",
              "league": {
                "rank": "x", "bestrank": "x", "gamesplayed": 10, "gameswon": 7,
                "rating": 24000.0, "glicko": 2500.0, "rd": 60.0, "apm": 120.0,
                "pps": 2.5, "vs": 250.0, "decaying": false
              }
            }
          ]
        }
      }
    }"#;

    let summary = p.ingest(&spool(doc), at(500)).await.unwrap();
    assert!(summary.fetch.success);
    assert_eq!(summary.fetch.cached_until(), Some(2000));
    assert_eq!(counts(&p).await, (1, 1, 1));

    let id = UpstreamId::from_bytes(vec![0xAA, 0xBB, 0xCC, 0xDD]);
    let user = p.store().get_user(id.clone()).await.unwrap().unwrap();
    assert_eq!(user.identity.upstream_id.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD]);

    let history = p.store().history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stat.fetch_id, summary.fetch.id);
    assert_eq!(history[0].stat.user_id, user.id);
    assert_eq!(history[0].stat.snapshot.gameswon, Some(7));

    let r = p.ingest(&spool(doc), at(1500)).await;
    assert!(matches!(r, Err(Error::RateLimited { .. })));
    assert_eq!(counts(&p).await, (1, 1, 1));
  }

  #[tokio::test]
  async fn ingests_a_bare_users_array() {
    let p = pipeline().await;
    let doc = json!({
      "success": true,
      "cache": { "status": "miss", "cached_at": 1000, "cached_until": 2000 },
      "data": { "users": [user("aa"), user("bb")] }
    })
    .to_string();

    let summary = p.ingest(&spool(&doc), at(0)).await.unwrap();
    assert_eq!(summary.stats, 2);
    assert_eq!(counts(&p).await, (1, 2, 2));
  }

  #[tokio::test]
  async fn second_run_inside_window_is_gated() {
    let p = pipeline().await;
    p.ingest(&spool(&payload(vec![user("aa")])), at(500)).await.unwrap();

    let gate = p.gate(at(1500)).await.unwrap();
    assert_eq!(gate.wait_secs(), Some(1));
    assert!(matches!(p.check_gate(at(1500)).await, Err(Error::RateLimited { .. })));

    // A stale decision is caught again inside the write transaction.
    let r = p.ingest(&spool(&payload(vec![user("aa")])), at(1500)).await;
    assert!(matches!(r, Err(Error::RateLimited { .. })));
    assert_eq!(counts(&p).await, (1, 1, 1));

    assert!(p.gate(at(2001)).await.unwrap().is_proceed());
  }

  #[tokio::test]
  async fn empty_user_list_records_a_run() {
    let p = pipeline().await;
    let summary = p.ingest(&spool(&payload(vec![])), at(0)).await.unwrap();
    assert_eq!(summary.stats, 0);
    assert_eq!(counts(&p).await, (1, 0, 0));
  }

  #[tokio::test]
  async fn malformed_payload_writes_nothing() {
    let p = pipeline().await;
    let doc = payload(vec![user("aa")]);
    let truncated = &doc[..doc.len() - 10];

    let r = p.ingest(&spool(truncated), at(0)).await;
    assert!(matches!(r, Err(Error::Extract(ladder_extract::Error::Malformed { .. }))));
    assert_eq!(counts(&p).await, (0, 0, 0));
  }

  #[tokio::test]
  async fn empty_body_has_no_envelope() {
    let p = pipeline().await;
    let r = p.ingest(&spool(""), at(0)).await;
    assert!(matches!(r, Err(Error::Extract(ladder_extract::Error::EmptyEnvelope))));
  }

  #[tokio::test]
  async fn bad_identity_rolls_back_the_run() {
    let p = pipeline().await;
    let doc = payload(vec![user("aa"), user("bb"), user("xyz")]);

    let r = p.ingest(&spool(&doc), at(0)).await;
    assert!(matches!(r, Err(Error::Store(_))));
    assert_eq!(counts(&p).await, (0, 0, 0));
  }

  #[tokio::test]
  async fn missing_field_rolls_back_the_run() {
    let p = pipeline().await;
    let mut broken = user("bb");
    broken["league"].as_object_mut().unwrap().remove("vs");
    let doc = payload(vec![user("aa"), broken]);

    match p.ingest(&spool(&doc), at(0)).await {
      Err(Error::Store(e)) => assert!(e.to_string().contains("league.vs")),
      other => panic!("expected a store error, got {other:?}"),
    }
    assert_eq!(counts(&p).await, (0, 0, 0));
  }

  #[tokio::test]
  async fn unsuccessful_envelope_is_recorded() {
    let p = pipeline().await;
    let doc = json!({
      "success": false,
      "error": "leaderboard unavailable",
      "data": { "users": { "item": [user("aa")] } }
    })
    .to_string();

    let summary = p.ingest(&spool(&doc), at(0)).await.unwrap();
    assert!(!summary.fetch.success);
    assert_eq!(summary.fetch.error.as_deref(), Some("leaderboard unavailable"));
    assert_eq!(summary.stats, 1);
  }
}
