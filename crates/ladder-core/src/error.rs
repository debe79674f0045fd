//! Error types for `ladder-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The payload is not valid JSON or lacks a required envelope field.
  #[error("malformed payload: {0}")]
  MalformedPayload(String),

  /// No top-level JSON object was found at all.
  #[error("payload contains no top-level object")]
  EmptyEnvelope,

  #[error("missing field: {0}")]
  MissingField(String),

  #[error("invalid value for {field}: {source}")]
  InvalidField {
    field:  String,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid identity {0:?}: expected even-length hex")]
  InvalidIdentity(String),

  #[error("failed to read payload: {0}")]
  Read(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
