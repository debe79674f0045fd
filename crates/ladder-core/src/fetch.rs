//! Fetch runs and the payload envelope that opens each one.
//!
//! Every ingestion attempt leaves exactly one [`FetchRun`] behind once it
//! commits. The run's cache window is what the [gate](crate::gate) consults
//! before the next attempt is allowed.

use serde::{Deserialize, Deserializer, Serialize};

// ─── Envelope ────────────────────────────────────────────────────────────────

/// The server-reported cache window of a snapshot, in epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheWindow {
  #[serde(default)]
  pub status:       Option<String>,
  #[serde(default)]
  pub cached_at:    Option<i64>,
  #[serde(default)]
  pub cached_until: Option<i64>,
}

/// The top-level members of a leaderboard payload, minus the user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
  pub success: bool,
  /// Upstream error text. Structured errors are kept as compact JSON.
  #[serde(default, deserialize_with = "error_text")]
  pub error:   Option<String>,
  #[serde(default)]
  pub cache:   Option<CacheWindow>,
}

/// Accepts either a bare string or any JSON value for `error`; empty strings,
/// `false` and `null` all mean "no error".
fn error_text<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<serde_json::Value>::deserialize(de)?;
  Ok(match value {
    None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => None,
    Some(serde_json::Value::String(s)) if s.is_empty() => None,
    Some(serde_json::Value::String(s)) => Some(s),
    Some(other) => Some(other.to_string()),
  })
}

// ─── FetchRun ────────────────────────────────────────────────────────────────

/// One row of the fetch log. Written once per committed ingestion and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRun {
  pub id:      i64,
  pub success: bool,
  pub error:   Option<String>,
  pub cache:   CacheWindow,
}

impl FetchRun {
  /// The instant (epoch millis) after which the next fetch is allowed.
  pub fn cached_until(&self) -> Option<i64> { self.cache.cached_until }
}
