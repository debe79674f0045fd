//! Error type for the ingestion driver.

use std::time::Duration;

use chrono::TimeDelta;
use ladder_core::gate::format_wait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The previous snapshot is still cached upstream.
  #[error("the most recent fetch has not expired yet; it expires in {}", format_wait(.wait))]
  RateLimited { wait: TimeDelta },

  #[error("request failed: {0}")]
  Network(#[source] reqwest::Error),

  #[error("download did not finish within {0:?}")]
  Timeout(Duration),

  #[error("upstream responded with {0}")]
  Http(reqwest::StatusCode),

  #[error("spool i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("extraction failed: {0}")]
  Extract(#[from] ladder_extract::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
