//! Error type for `ladder-extract`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("payload contains no top-level object")]
  EmptyEnvelope,

  /// Structural JSON error found by the scanner.
  #[error("malformed payload at byte {offset}: {message}")]
  Malformed { offset: u64, message: String },

  /// A captured value failed to deserialize.
  #[error("malformed payload: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for ladder_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Io(e) => Self::Read(e),
      Error::EmptyEnvelope => Self::EmptyEnvelope,
      Error::Malformed { offset, message } => {
        Self::MalformedPayload(format!("{message} at byte {offset}"))
      }
      Error::Json(e) => Self::MalformedPayload(e.to_string()),
    }
  }
}
