//! Rate-limit-gated leaderboard ingestion.
//!
//! [`Pipeline`] ties the pieces together: the cache-expiry gate, the HTTP
//! download into a [`Spool`](ladder_extract::Spool), the two extraction
//! passes, and the atomic write into a
//! [`LeaderboardStore`](ladder_core::store::LeaderboardStore).

pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod settings;

pub use error::{Error, Result};
pub use fetch::Fetcher;
pub use pipeline::Pipeline;
pub use settings::Settings;
