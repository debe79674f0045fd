//! Users, their point-in-time statistics, and the record merger.
//!
//! An upstream user object carries its identity, profile and a nested
//! `league` object. [`merge`] splits it into the two halves the store cares
//! about: the [`Identity`] (deduplicated, last-write-wins) and the
//! [`Snapshot`] (appended once per fetch run).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── UpstreamId ──────────────────────────────────────────────────────────────

/// The raw bytes of an upstream hex identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpstreamId(Vec<u8>);

impl UpstreamId {
  /// Decode an even-length hex string (either case).
  pub fn from_hex(s: &str) -> Result<Self> {
    hex::decode(s)
      .map(Self)
      .map_err(|_| Error::InvalidIdentity(s.to_owned()))
  }

  pub fn from_bytes(bytes: Vec<u8>) -> Self { Self(bytes) }

  pub fn as_bytes(&self) -> &[u8] { &self.0 }

  pub fn to_hex(&self) -> String { hex::encode(&self.0) }
}

impl fmt::Display for UpstreamId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

// ─── Normalized halves ───────────────────────────────────────────────────────

/// The mutable identity row of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
  pub upstream_id: UpstreamId,
  pub role:        Option<String>,
  pub bestrank:    Option<String>,
  pub supporter:   Option<bool>,
  pub verified:    Option<bool>,
}

/// Everything about a user that is recorded per fetch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub username:    Option<String>,
  pub country:     Option<String>,
  pub rank:        Option<String>,
  pub decaying:    Option<bool>,
  pub xp:          Option<f64>,
  pub gamesplayed: Option<i64>,
  pub gameswon:    Option<i64>,
  pub rating:      Option<f64>,
  pub glicko:      Option<f64>,
  pub rd:          Option<f64>,
  pub apm:         Option<f64>,
  pub pps:         Option<f64>,
  pub vs:          Option<f64>,
}

/// One upstream user, flattened and converted for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
  pub identity: Identity,
  pub snapshot: Snapshot,
}

impl NormalizedRecord {
  /// Attach the fetch run this record is being ingested under.
  pub fn for_fetch(self, fetch_id: i64) -> StatRecord {
    StatRecord { fetch_id, record: self }
  }
}

/// A normalized record bound to the fetch run that produced it; the unit
/// the store writes.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
  pub fetch_id: i64,
  pub record:   NormalizedRecord,
}

// ─── Raw input ───────────────────────────────────────────────────────────────

/// A single user object exactly as it appeared in the payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawUser(Map<String, Value>);

impl RawUser {
  pub fn new(fields: Map<String, Value>) -> Self { Self(fields) }

  pub fn into_inner(self) -> Map<String, Value> { self.0 }
}

// ─── Merge ───────────────────────────────────────────────────────────────────

fn take<T: DeserializeOwned>(
  obj: &mut Map<String, Value>,
  parent: Option<&str>,
  key: &str,
) -> Result<T> {
  let field = || match parent {
    Some(p) => format!("{p}.{key}"),
    None => key.to_owned(),
  };
  let value = obj.remove(key).ok_or_else(|| Error::MissingField(field()))?;
  serde_json::from_value(value).map_err(|source| Error::InvalidField {
    field: field(),
    source,
  })
}

/// A count column. Upstream occasionally encodes these as floats (`3.0`);
/// whole-valued floats are accepted, fractional ones are not.
struct Count(Option<i64>);

impl<'de> Deserialize<'de> for Count {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    use serde::de::Error as _;

    let Some(n) = Option::<serde_json::Number>::deserialize(de)? else {
      return Ok(Self(None));
    };
    n.as_i64()
      .or_else(|| {
        n.as_f64()
          .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
          .map(|f| f as i64)
      })
      .map(|n| Self(Some(n)))
      .ok_or_else(|| D::Error::custom(format!("expected a whole number, found {n}")))
  }
}

/// Convert one upstream user into a [`NormalizedRecord`].
///
/// Every field must be present; `null` is accepted for everything except
/// `_id`. Unknown fields are ignored.
pub fn merge(raw: RawUser) -> Result<NormalizedRecord> {
  let mut user = raw.into_inner();
  let id: String = take(&mut user, None, "_id")?;
  let mut league: Map<String, Value> = take(&mut user, None, "league")?;
  let league_field = Some("league");

  let identity = Identity {
    upstream_id: UpstreamId::from_hex(&id)?,
    role:        take(&mut user, None, "role")?,
    bestrank:    take(&mut league, league_field, "bestrank")?,
    supporter:   take(&mut user, None, "supporter")?,
    verified:    take(&mut user, None, "verified")?,
  };

  let snapshot = Snapshot {
    username:    take(&mut user, None, "username")?,
    country:     take(&mut user, None, "country")?,
    xp:          take(&mut user, None, "xp")?,
    rank:        take(&mut league, league_field, "rank")?,
    decaying:    take(&mut league, league_field, "decaying")?,
    gamesplayed: take::<Count>(&mut league, league_field, "gamesplayed")?.0,
    gameswon:    take::<Count>(&mut league, league_field, "gameswon")?.0,
    rating:      take(&mut league, league_field, "rating")?,
    glicko:      take(&mut league, league_field, "glicko")?,
    rd:          take(&mut league, league_field, "rd")?,
    apm:         take(&mut league, league_field, "apm")?,
    pps:         take(&mut league, league_field, "pps")?,
    vs:          take(&mut league, league_field, "vs")?,
  };

  Ok(NormalizedRecord { identity, snapshot })
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A persisted identity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:       i64,
  pub identity: Identity,
}

/// A persisted history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stat {
  pub id:       i64,
  pub fetch_id: i64,
  pub user_id:  i64,
  pub snapshot: Snapshot,
}

/// A history row together with the cache timestamp of its fetch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub stat:      Stat,
  pub cached_at: Option<i64>,
}
