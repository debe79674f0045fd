//! Core types and trait definitions for the leaderboard ingester.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the data model, the cache-expiry gate and the record merger; storage
//! backends implement [`store::LeaderboardStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
#![allow(async_fn_in_trait)]

pub mod error;
pub mod fetch;
pub mod gate;
pub mod store;
pub mod user;

pub use error::{Error, Result};
