//! Streaming extraction of leaderboard payloads.
//!
//! A payload is spooled once into a [`Spool`] and then scanned twice: the
//! first pass skips the user list and yields the [`Envelope`], the second
//! selects the user list and yields one [`RawUser`] at a time. The user list
//! is never materialized as a whole: the first pass walks over it without
//! retaining anything, the second holds one record at a time.
//!
//! [`Envelope`]: ladder_core::fetch::Envelope
//! [`RawUser`]: ladder_core::user::RawUser

mod extract;
mod scan;
mod spool;

pub mod error;

pub use error::{Error, Result};
pub use extract::{ENVELOPE_SKIP, ITEM, RECORDS_PATH, Records, envelope};
pub use spool::Spool;
