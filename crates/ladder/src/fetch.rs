//! HTTP download of the leaderboard snapshot.

use std::{io::Write, time::Duration};

use ladder_extract::Spool;
use reqwest::Client;
use tracing::{debug, info};

use crate::{Error, Result, Settings};

/// Log download progress every this many bytes.
const PROGRESS_STEP: u64 = 4 * 1024 * 1024;

/// Downloads the snapshot endpoint into a [`Spool`].
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct Fetcher {
  client:   Client,
  endpoint: String,
  timeout:  Duration,
}

impl Fetcher {
  pub fn new(settings: &Settings) -> Result<Self> {
    let timeout = settings.timeout();
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(settings.user_agent.as_str())
      .build()
      .map_err(Error::Network)?;
    Ok(Self { client, endpoint: settings.endpoint.clone(), timeout })
  }

  pub fn endpoint(&self) -> &str { &self.endpoint }

  fn classify(&self, e: reqwest::Error) -> Error {
    if e.is_timeout() {
      Error::Timeout(self.timeout)
    } else {
      Error::Network(e)
    }
  }

  /// `GET` the endpoint and spool the whole body. The client timeout covers
  /// the body as well, so a stalled download fails with [`Error::Timeout`].
  pub async fn download(&self) -> Result<Spool> {
    info!(endpoint = %self.endpoint, "downloading snapshot");

    let mut response = self
      .client
      .get(&self.endpoint)
      .send()
      .await
      .map_err(|e| self.classify(e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::Http(status));
    }

    let mut spool = Spool::new()?;
    let mut next_report = PROGRESS_STEP;
    while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
      spool.write_all(&chunk)?;
      if spool.len() >= next_report {
        debug!(kib = spool.len() / 1024, "downloading");
        next_report += PROGRESS_STEP;
      }
    }
    spool.flush()?;

    info!(kib = spool.len() / 1024, "download complete");
    Ok(spool)
  }
}
