//! Runtime configuration.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://ch.tetr.io/api/users/lists/league/all";

/// Settings read from an optional TOML file, overridden by `LADDER_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub database_path: PathBuf,
  pub endpoint:      String,
  /// Hard limit on the whole download, in seconds.
  pub timeout_secs:  u64,
  pub user_agent:    String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      database_path: PathBuf::from("data.db"),
      endpoint:      DEFAULT_ENDPOINT.to_owned(),
      timeout_secs:  300,
      user_agent:    concat!("ladder/", env!("CARGO_PKG_VERSION")).to_owned(),
    }
  }
}

impl Settings {
  /// Layer `path` (if it exists) and the environment over the defaults.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("LADDER"))
      .build()?
      .try_deserialize()
  }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

  /// The database path with a leading `~` expanded.
  pub fn database_path(&self) -> PathBuf { expand_tilde(&self.database_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
